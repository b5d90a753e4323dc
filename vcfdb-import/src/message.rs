use crossbeam_channel::Receiver;

use vcfdb_core::{Result, VariantRecord};

///
/// Item of every pipeline queue. A producer sends one `EndOfStream` per
/// consumer of its queue when it is done.
///
#[derive(Debug, Clone, PartialEq)]
pub enum Message<T> {
    Data(T),
    EndOfStream,
}

///
/// The records of one parse queue as a record sequence, ending at the first
/// `EndOfStream` or when the parse worker is gone.
///
pub struct ChannelRecords {
    rx: Receiver<Message<VariantRecord>>,
    ended: bool,
}

impl ChannelRecords {
    pub fn new(rx: Receiver<Message<VariantRecord>>) -> Self {
        ChannelRecords { rx, ended: false }
    }
}

impl Iterator for ChannelRecords {
    type Item = Result<VariantRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.ended {
            return None;
        }
        match self.rx.recv() {
            Ok(Message::Data(record)) => Some(Ok(record)),
            Ok(Message::EndOfStream) | Err(_) => {
                self.ended = true;
                None
            }
        }
    }
}
