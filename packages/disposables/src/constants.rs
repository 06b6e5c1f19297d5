// A poisoned lock means another thread panicked inside a critical section, so the state the lock
// was protecting can no longer be trusted. Continuing is not safe (we panic).
pub(crate) const ERR_POISONED_LOCK: &str = "encountered poisoned lock - a thread panicked while \
    holding it and the protected state can no longer be trusted";
