/// Millisecond time source for the playback engine.
///
/// The counter is allowed to wrap; the engine only ever looks at differences.
pub trait Clock {
    fn now_ms(&self) -> u32;
}

impl<K: Clock + ?Sized> Clock for &K {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }
}
