use crate::{
    camera::{Camera, CameraError, Capture, CaptureRequest},
    outbound::Outbound,
    telemetry::Telemetry,
};
use anyhow::Context;
use mavlink_codec::{message::CameraTrigger, Frame, Message};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug, Default)]
pub struct DispatchSettings {
    pub camera_id: u8,
    pub capture: CaptureRequest,
    pub capture_url_prefix: String,
    pub detection_url_prefix: String,
}

/// Acts on inbound messages, one at a time.
pub struct Dispatcher<C> {
    outbound: Outbound,
    camera: Arc<Mutex<C>>,
    telemetry: Telemetry,
    settings: DispatchSettings,
}

impl<C: Camera> Dispatcher<C> {
    pub fn new(
        outbound: Outbound,
        camera: Arc<Mutex<C>>,
        telemetry: Telemetry,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            outbound,
            camera,
            telemetry,
            settings,
        }
    }

    pub async fn process(&mut self, frame: Frame) -> anyhow::Result<()> {
        let Frame {
            system_id,
            component_id,
            message,
            ..
        } = frame;

        match message {
            Message::Heartbeat(_)
            | Message::CameraImageCaptured(_)
            | Message::CameraCaptureStatus(_) => {
                tracing::info!("[{system_id}:{component_id}] {message:?}");
            }
            Message::CommandLong(command) => match command.mav_cmd() {
                Some(cmd) => tracing::info!("[{system_id}:{component_id}] {cmd:?} {command:?}"),
                None => tracing::debug!("[{system_id}:{component_id}] {command:?}"),
            },
            Message::GlobalPositionInt(position) => self.telemetry.update_position(position),
            Message::CameraTrigger(trigger) => {
                tracing::info!("[{system_id}:{component_id}] {trigger:?}");
                self.on_trigger(trigger).await?;
            }
            other => tracing::debug!("[{system_id}:{component_id}] Ignoring message {}", other.id()),
        }
        Ok(())
    }

    async fn on_trigger(&mut self, trigger: CameraTrigger) -> anyhow::Result<()> {
        let outcome = {
            let mut camera = self.camera.lock().await;
            camera.capture(&self.settings.capture).await
        };
        let (capture, success) = match outcome {
            Ok(capture) => (capture, true),
            Err(CameraError::CaptureTimeout { index, path, attempts }) => {
                tracing::warn!(
                    "Trigger {} produced no image after {attempts} polls",
                    trigger.seq
                );
                (Capture { index, path }, false)
            }
            Err(e) => return Err(e).context("Capture failed"),
        };

        let camera_id = self.settings.camera_id;
        let captured = self.telemetry.image_captured(
            camera_id,
            &capture,
            success,
            &self.settings.capture_url_prefix,
        );
        let detected =
            self.telemetry
                .object_detected(camera_id, &capture, &self.settings.detection_url_prefix);
        self.outbound.send(Message::CameraImageCaptured(captured))?;
        self.outbound.send(Message::ObjectDetected(detected))?;
        Ok(())
    }
}

/// Feeds queued frames to the dispatcher in arrival order.
///
/// Processing errors are logged and the loop goes on, except for a camera
/// that could not be brought back: then `failed` is cancelled and the loop
/// ends.
pub async fn consume<C: Camera>(
    mut dispatcher: Dispatcher<C>,
    mut queue: mpsc::UnboundedReceiver<Frame>,
    token: CancellationToken,
    failed: CancellationToken,
) {
    tracing::info!("Start consume task");
    loop {
        let frame = tokio::select! {
            biased;
            () = token.cancelled() => break,
            frame = queue.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };
        tracing::debug!("Consuming message {}", frame.id());
        if let Err(e) = dispatcher.process(frame).await {
            if e.downcast_ref::<CameraError>().is_some_and(CameraError::is_fatal) {
                tracing::error!("Camera lost for good: {e:#}");
                failed.cancel();
                break;
            }
            tracing::error!("Error while processing message: {e:#}");
        }
    }
    tracing::info!("Exit from consume task");
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        camera::{
            scripted::{handshake, refused, shoot, ScriptedLauncher},
            CameraDriver, CameraSettings,
        },
        session::Identity,
    };
    use async_trait::async_trait;
    use bytes::{Bytes, BytesMut};
    use mavlink_codec::{
        message::{id, GlobalPositionInt, Heartbeat},
        MavlinkCodec,
    };
    use std::{net::SocketAddr, path::PathBuf, time::Duration};
    use tokio::{sync::watch, time::Instant};
    use tokio_test::io::Builder;
    use tokio_util::codec::Decoder;

    enum Outcome {
        Found,
        Missing,
        Broken,
    }

    struct FakeCamera {
        outcome: Outcome,
        counter: u32,
    }

    impl FakeCamera {
        fn new(outcome: Outcome) -> Self {
            Self { outcome, counter: 0 }
        }
    }

    #[async_trait]
    impl Camera for FakeCamera {
        async fn capture(&mut self, _request: &CaptureRequest) -> Result<Capture, CameraError> {
            let index = self.counter;
            let path = PathBuf::from(format!("captures/img_{index}.jpg"));
            match self.outcome {
                Outcome::Found => {
                    self.counter += 1;
                    Ok(Capture { index, path })
                }
                Outcome::Missing => {
                    self.counter += 1;
                    Err(CameraError::CaptureTimeout {
                        index,
                        path,
                        attempts: 100,
                    })
                }
                Outcome::Broken => Err(CameraError::ProcessExited {
                    command: "=set_mf(0)".to_string(),
                }),
            }
        }
    }

    struct Harness {
        dispatcher: Dispatcher<FakeCamera>,
        peer: watch::Sender<Option<SocketAddr>>,
        sent: mpsc::UnboundedReceiver<(Bytes, SocketAddr)>,
    }

    impl Harness {
        fn new(outcome: Outcome) -> Self {
            let (peer, peer_rx) = watch::channel(None);
            let (tx, sent) = mpsc::unbounded_channel();
            let identity = Identity {
                system_id: 1,
                component_id: 100,
            };
            let settings = DispatchSettings {
                camera_id: 1,
                capture: CaptureRequest::default(),
                capture_url_prefix: "/captures".to_string(),
                detection_url_prefix: "/detections".to_string(),
            };
            let dispatcher = Dispatcher::new(
                Outbound::new(identity, peer_rx, tx),
                Arc::new(Mutex::new(FakeCamera::new(outcome))),
                Telemetry::new(Instant::now()),
                settings,
            );
            Self {
                dispatcher,
                peer,
                sent,
            }
        }

        fn connect(&self) {
            self.peer.send_replace(Some("127.0.0.1:14550".parse().unwrap()));
        }

        fn sent(&mut self) -> Vec<Message> {
            let mut messages = Vec::new();
            while let Ok((datagram, _)) = self.sent.try_recv() {
                let frame = MavlinkCodec
                    .decode(&mut BytesMut::from(&datagram[..]))
                    .unwrap()
                    .unwrap();
                messages.push(frame.message);
            }
            messages
        }
    }

    fn frame(message: Message) -> Frame {
        Frame {
            sequence: 0,
            system_id: 255,
            component_id: 190,
            message,
        }
    }

    fn trigger() -> Frame {
        frame(Message::CameraTrigger(CameraTrigger {
            time_usec: 1_000_000,
            seq: 1,
        }))
    }

    #[tokio::test]
    async fn trigger_reports_capture_then_detection() {
        let mut harness = Harness::new(Outcome::Found);
        harness.connect();
        harness
            .dispatcher
            .process(frame(Message::GlobalPositionInt(GlobalPositionInt {
                lat: 557_558_000,
                lon: 376_173_000,
                ..GlobalPositionInt::default()
            })))
            .await
            .unwrap();

        harness.dispatcher.process(trigger()).await.unwrap();

        let sent = harness.sent();
        assert_eq!(2, sent.len());
        let Message::CameraImageCaptured(captured) = &sent[0] else {
            panic!("expected image captured, got {:?}", sent[0]);
        };
        assert_eq!(1, captured.capture_result);
        assert_eq!(0, captured.image_index);
        assert_eq!(557_558_000, captured.lat);
        assert_eq!("/captures/img_0.jpg", captured.file_url);
        let Message::ObjectDetected(detected) = &sent[1] else {
            panic!("expected object detected, got {:?}", sent[1]);
        };
        assert_eq!(0, detected.source_image_index);
        assert_eq!(376_173_000, detected.lon);
        assert_eq!("/detections/0/img_0.jpg", detected.file_url);
    }

    #[tokio::test]
    async fn missing_image_is_reported_as_failed_capture() {
        let mut harness = Harness::new(Outcome::Missing);
        harness.connect();

        harness.dispatcher.process(trigger()).await.unwrap();
        harness.dispatcher.process(trigger()).await.unwrap();

        let sent = harness.sent();
        let ids: Vec<u32> = sent.iter().map(Message::id).collect();
        assert_eq!(
            vec![
                id::CAMERA_IMAGE_CAPTURED,
                id::LACMUS_OBJECT_DETECTED,
                id::CAMERA_IMAGE_CAPTURED,
                id::LACMUS_OBJECT_DETECTED
            ],
            ids
        );
        let Message::CameraImageCaptured(second) = &sent[2] else {
            unreachable!()
        };
        assert_eq!(0, second.capture_result);
        assert_eq!(1, second.image_index);
    }

    #[tokio::test]
    async fn broken_camera_reports_error_and_sends_nothing() {
        let mut harness = Harness::new(Outcome::Broken);
        harness.connect();

        assert!(harness.dispatcher.process(trigger()).await.is_err());
        assert!(harness.sent().is_empty());
    }

    #[tokio::test]
    async fn reports_are_dropped_without_peer() {
        let mut harness = Harness::new(Outcome::Found);

        harness.dispatcher.process(trigger()).await.unwrap();
        assert!(harness.sent().is_empty());
        assert_eq!(1, harness.dispatcher.camera.lock().await.counter);
    }

    #[tokio::test]
    async fn other_messages_emit_nothing() {
        let mut harness = Harness::new(Outcome::Found);
        harness.connect();

        let heartbeat = Heartbeat {
            mav_type: mavlink_codec::message::common::MAV_TYPE_GCS,
            ..Heartbeat::default()
        };
        harness
            .dispatcher
            .process(frame(Message::Heartbeat(heartbeat)))
            .await
            .unwrap();
        harness
            .dispatcher
            .process(frame(Message::Unknown {
                id: 77,
                payload: Bytes::from_static(&[1]),
            }))
            .await
            .unwrap();
        assert!(harness.sent().is_empty());
        assert!(harness.dispatcher.telemetry.position().is_none());
    }

    #[tokio::test]
    async fn consumer_survives_failed_dispatch() {
        let harness = Harness::new(Outcome::Broken);
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let failed = CancellationToken::new();
        let task = tokio::spawn(consume(
            harness.dispatcher,
            queue_rx,
            token.clone(),
            failed.clone(),
        ));

        queue_tx.send(trigger()).unwrap();
        queue_tx
            .send(frame(Message::GlobalPositionInt(GlobalPositionInt::default())))
            .unwrap();
        drop(queue_tx);

        // the closed queue ends the loop once both frames are handled
        task.await.unwrap();
        assert!(!token.is_cancelled());
        assert!(!failed.is_cancelled());
    }

    fn driver_harness(
        launcher: ScriptedLauncher,
        captures_dir: &std::path::Path,
        init_attempts: u32,
    ) -> (
        Dispatcher<CameraDriver<ScriptedLauncher>>,
        mpsc::UnboundedReceiver<(Bytes, SocketAddr)>,
        Arc<Mutex<CameraDriver<ScriptedLauncher>>>,
    ) {
        let (_, peer_rx) = watch::channel(Some("127.0.0.1:14550".parse().unwrap()));
        let (tx, sent) = mpsc::unbounded_channel();
        let identity = Identity {
            system_id: 1,
            component_id: 100,
        };
        let settings = CameraSettings {
            captures_dir: captures_dir.to_path_buf(),
            shoot_script: PathBuf::from("/opt/chdkptp/shoot.lua"),
            init_attempts,
            ..CameraSettings::default()
        };
        let camera = Arc::new(Mutex::new(CameraDriver::new(launcher, settings)));
        let dispatcher = Dispatcher::new(
            Outbound::new(identity, peer_rx, tx),
            camera.clone(),
            Telemetry::new(Instant::now()),
            DispatchSettings::default(),
        );
        (dispatcher, sent, camera)
    }

    fn silent_on_focus() -> tokio_test::io::Mock {
        handshake(&mut Builder::new())
            .write(b"=set_mf(0)\n")
            .wait(Duration::from_secs(20))
            .build()
    }

    #[tokio::test(start_paused = true)]
    async fn camera_recovers_after_silent_child() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("img_0.jpg"), b"jpeg").unwrap();
        let healthy = handshake(&mut Builder::new())
            .write(b"=set_mf(0)\n")
            .read(b"0\n")
            .write(shoot(dir.path(), 0).as_bytes())
            .read(b"___> rs\nshot\ndone\n")
            .build();
        let launcher = ScriptedLauncher::new([silent_on_focus(), healthy]);
        let (dispatcher, mut sent, camera) = driver_harness(launcher, dir.path(), 5);
        camera.lock().await.init().await.unwrap();

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let failed = CancellationToken::new();
        let task = tokio::spawn(consume(
            dispatcher,
            queue_rx,
            CancellationToken::new(),
            failed.clone(),
        ));
        queue_tx.send(trigger()).unwrap();
        queue_tx.send(trigger()).unwrap();
        drop(queue_tx);
        task.await.unwrap();

        let mut ids = Vec::new();
        while let Ok((datagram, _)) = sent.try_recv() {
            let frame = MavlinkCodec
                .decode(&mut BytesMut::from(&datagram[..]))
                .unwrap()
                .unwrap();
            ids.push(frame.message.id());
        }
        assert_eq!(
            vec![id::CAMERA_IMAGE_CAPTURED, id::LACMUS_OBJECT_DETECTED],
            ids
        );
        assert!(!failed.is_cancelled());
        let camera = camera.lock().await;
        assert!(camera.is_initialized());
        assert_eq!(1, camera.counter());
    }

    #[tokio::test(start_paused = true)]
    async fn unrecoverable_camera_stops_consumer() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = ScriptedLauncher::new([silent_on_focus(), refused()]);
        let (dispatcher, mut sent, camera) = driver_harness(launcher, dir.path(), 2);
        camera.lock().await.init().await.unwrap();

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let failed = CancellationToken::new();
        let task = tokio::spawn(consume(
            dispatcher,
            queue_rx,
            CancellationToken::new(),
            failed.clone(),
        ));
        queue_tx.send(trigger()).unwrap();
        queue_tx.send(trigger()).unwrap();

        // the queue stays open, only the failure ends the loop
        task.await.unwrap();
        assert!(failed.is_cancelled());
        assert!(sent.try_recv().is_err());
        drop(queue_tx);
    }
}
