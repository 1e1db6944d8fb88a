//! An in-memory writer used by tests (and suitable as a fallback sink in
//! examples) that just records every decoded message it receives.

use crate::decode::DecodedRecord;
use crate::writer::Writer;
use std::sync::Mutex;

#[derive(Default)]
pub struct VecWriter {
    messages: Mutex<Vec<String>>,
}

impl VecWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Writer for VecWriter {
    fn write(&self, record: &DecodedRecord) {
        self.messages.lock().unwrap().push(record.message.clone());
    }

    fn flush(&self) {}
}
