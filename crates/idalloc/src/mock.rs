use crate::{AllocationAuthority, Result};
use core::future::Future;
use parking_lot::Mutex;

/// Answers every request with the same canned response and records what was
/// asked.
pub struct ScriptedAuthority {
    response: Result<Vec<i64>>,
    calls: Mutex<Vec<(String, u32)>>,
}

impl ScriptedAuthority {
    pub fn returning(response: Result<Vec<i64>>) -> Self {
        Self {
            response,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().clone()
    }
}

impl AllocationAuthority for ScriptedAuthority {
    fn allocate_ids(
        &self,
        kind: &str,
        count: u32,
    ) -> impl Future<Output = Result<Vec<i64>>> + Send {
        self.calls.lock().push((kind.to_owned(), count));
        core::future::ready(self.response.clone())
    }
}

/// Never answers.
#[derive(Default)]
pub struct HangingAuthority {
    calls: Mutex<usize>,
}

impl HangingAuthority {
    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

impl AllocationAuthority for HangingAuthority {
    fn allocate_ids(
        &self,
        _kind: &str,
        _count: u32,
    ) -> impl Future<Output = Result<Vec<i64>>> + Send {
        *self.calls.lock() += 1;
        core::future::pending()
    }
}
