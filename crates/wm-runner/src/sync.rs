//! Lock helper shared by the runner modules

use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, recovering the guard if a panicking handler poisoned it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
