use crate::enums::{ContentType, ProtocolVersion};
use crate::msgs::message::{BorrowedPlainMessage, PlainMessage};

pub const MAX_FRAGMENT_LEN: usize = 16384;

pub struct MessageFragmenter {
    max_frag: usize,
}

impl Default for MessageFragmenter {
    fn default() -> Self {
        Self {
            max_frag: MAX_FRAGMENT_LEN,
        }
    }
}

impl MessageFragmenter {
    /// Take the Message `msg` and re-fragment it into new
    /// messages whose fragment is no more than max_frag.
    /// Return an iterator across those messages.
    /// Payloads are borrowed.
    ///
    /// An empty payload still produces one (empty) fragment.
    pub fn fragment_message<'a>(
        &self,
        msg: &'a PlainMessage,
    ) -> impl Iterator<Item = BorrowedPlainMessage<'a>> + 'a {
        self.fragment_slice(msg.typ, msg.version, &msg.payload.0)
    }

    pub fn fragment_slice<'a>(
        &self,
        typ: ContentType,
        version: ProtocolVersion,
        payload: &'a [u8],
    ) -> impl Iterator<Item = BorrowedPlainMessage<'a>> + 'a {
        let empty: &'a [u8] = &[];
        let chunks: Box<dyn Iterator<Item = &'a [u8]> + 'a> = match payload.is_empty() {
            true => Box::new(std::iter::once(empty)),
            false => Box::new(payload.chunks(self.max_frag)),
        };

        chunks.map(move |c| BorrowedPlainMessage {
            typ,
            version,
            payload: c,
        })
    }
}
