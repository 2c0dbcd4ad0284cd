use std::collections::VecDeque;

use crate::enums::{AlertDescription, ContentType};
use crate::error::InvalidMessage;
use crate::msgs::codec::{Codec, Reader};
use crate::msgs::enums::AlertLevel;
use crate::msgs::message::PlainMessage;

/// An alert is always a level byte and a description byte.
const ALERT_SIZE: usize = 2;

#[derive(Debug)]
pub struct AlertMessagePayload {
    pub level: AlertLevel,
    pub description: AlertDescription,
}

impl Codec for AlertMessagePayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.level.encode(bytes);
        self.description.encode(bytes);
    }

    fn read(r: &mut Reader) -> Result<Self, InvalidMessage> {
        let level = AlertLevel::read(r)?;
        let description = AlertDescription::read(r)?;
        r.expect_empty("AlertMessagePayload")
            .map(|_| Self { level, description })
    }
}

/// Reassembles alerts from alert records.
///
/// Record boundaries mean nothing to the alert protocol: one record
/// can carry several alerts, and one alert can be split over two
/// records.  Any odd byte waits here for the next alert record.
#[derive(Default)]
pub struct AlertJoiner {
    /// Completed alerts for output.
    frames: VecDeque<AlertMessagePayload>,

    /// Bytes of an alert we have not yet seen all of.
    buf: Vec<u8>,
}

impl AlertJoiner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Is part of an alert waiting for its next byte?
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Take the next completed alert, if any.
    pub fn pop(&mut self) -> Option<AlertMessagePayload> {
        self.frames.pop_front()
    }

    /// Add the payload of an alert record, and return how many
    /// alerts it completed.
    pub fn push(&mut self, msg: PlainMessage) -> Result<usize, InvalidMessage> {
        debug_assert_eq!(msg.typ, ContentType::Alert);
        self.buf
            .extend_from_slice(&msg.payload.0);

        let mut count = 0;
        let mut used = 0;
        while let Some(bytes) = self
            .buf
            .get(used..used + ALERT_SIZE)
        {
            self.frames
                .push_back(AlertMessagePayload::read_bytes(bytes)?);
            used += ALERT_SIZE;
            count += 1;
        }

        self.buf.drain(..used);
        Ok(count)
    }
}
