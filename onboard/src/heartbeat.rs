use crate::outbound::Outbound;
use mavlink_codec::{
    message::{common, Heartbeat},
    Message,
};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub fn onboard_heartbeat() -> Message {
    Message::Heartbeat(Heartbeat {
        custom_mode: 0,
        mav_type: common::MAV_TYPE_ONBOARD_CONTROLLER,
        autopilot: common::MAV_AUTOPILOT_INVALID,
        base_mode: 0,
        system_status: common::MAV_STATE_ACTIVE,
        mavlink_version: common::MAVLINK_VERSION,
    })
}

pub async fn heartbeat(dur: Duration, outbound: Outbound, token: CancellationToken) {
    tracing::info!("Start heartbeat task");
    let mut interval = tokio::time::interval(dur);
    // after a stall, resume the cadence instead of bursting missed beats
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = interval.tick() => {
                tracing::trace!("Sending heartbeat");
                if let Err(e) = outbound.send(onboard_heartbeat()) {
                    tracing::error!("Failed to send heartbeat: {e:#}");
                }
            }
        }
    }
    tracing::info!("Exit from heartbeat task");
}
