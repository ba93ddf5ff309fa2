use starling_core::host::RandomSource;

use crate::bindings::wasi::random::random;

pub struct WasiRandom;

impl RandomSource for WasiRandom {
    fn get_bytes(&self, n: usize) -> Vec<u8> {
        random::get_random_bytes(n as u64)
    }

    fn get_u32(&self) -> u32 {
        random::get_random_u64() as u32
    }
}
