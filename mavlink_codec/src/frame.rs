use crate::message::Message;

/// One MAVLink v2 packet with its routing header.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub sequence: u8,
    pub system_id: u8,
    pub component_id: u8,
    pub message: Message,
}

impl Frame {
    pub fn id(&self) -> u32 {
        self.message.id()
    }
}
