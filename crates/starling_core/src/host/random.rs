/// Wraps `wasi:random/random`.
pub trait RandomSource {
    fn get_bytes(&self, n: usize) -> Vec<u8>;
    fn get_u32(&self) -> u32;
}
