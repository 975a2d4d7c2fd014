//! Scalar method generation for `Buffer`.

/// Lists the multi-byte scalars with `to_{be,le}_bytes`.
/// Arguments passed to callback:
/// 1. Rust Type
/// 2. Relative put
/// 3. Relative get
/// 4. Sequence put
/// 5. Sequence get
/// 6. Absolute put
/// 7. Absolute get
macro_rules! for_each_multibyte {
    ($m:ident) => {
        $m!(i16, put_i16, get_i16, put_i16_seq, get_i16_seq, put_i16_at, get_i16_at);
        $m!(u16, put_u16, get_u16, put_u16_seq, get_u16_seq, put_u16_at, get_u16_at);
        $m!(i32, put_i32, get_i32, put_i32_seq, get_i32_seq, put_i32_at, get_i32_at);
        $m!(u32, put_u32, get_u32, put_u32_seq, get_u32_seq, put_u32_at, get_u32_at);
        $m!(i64, put_i64, get_i64, put_i64_seq, get_i64_seq, put_i64_at, get_i64_at);
        $m!(u64, put_u64, get_u64, put_u64_seq, get_u64_seq, put_u64_at, get_u64_at);
        $m!(f32, put_f32, get_f32, put_f32_seq, get_f32_seq, put_f32_at, get_f32_at);
        $m!(f64, put_f64, get_f64, put_f64_seq, get_f64_seq, put_f64_at, get_f64_at);
    };
}

/// Generates the relative, sequence and absolute accessors for one scalar.
/// Every width check happens before the first byte is copied.
macro_rules! impl_multibyte {
    ($ty:ty, $put:ident, $get:ident, $put_seq:ident, $get_seq:ident, $put_at:ident, $get_at:ident) => {
        #[doc = concat!("Writes a `", stringify!($ty), "` at the cursor in the buffer's byte order.")]
        pub fn $put(&mut self, v: $ty) -> crate::Result<&mut Self> {
            const WIDTH: usize = std::mem::size_of::<$ty>();
            let start = self.claim_write(WIDTH)?;
            let bytes = match self.order {
                crate::ByteOrder::Big => v.to_be_bytes(),
                crate::ByteOrder::Little => v.to_le_bytes(),
            };
            self.data[start..start + WIDTH].copy_from_slice(&bytes);
            Ok(self)
        }

        #[doc = concat!("Reads a `", stringify!($ty), "` at the cursor in the buffer's byte order.")]
        pub fn $get(&mut self) -> crate::Result<$ty> {
            const WIDTH: usize = std::mem::size_of::<$ty>();
            let start = self.claim_read(WIDTH)?;
            let mut bytes = [0u8; WIDTH];
            bytes.copy_from_slice(&self.data[start..start + WIDTH]);
            Ok(match self.order {
                crate::ByteOrder::Big => <$ty>::from_be_bytes(bytes),
                crate::ByteOrder::Little => <$ty>::from_le_bytes(bytes),
            })
        }

        #[doc = concat!("Writes a `", stringify!($ty), "` sequence. Nothing is written unless all of it fits.")]
        pub fn $put_seq(&mut self, v: &[$ty]) -> crate::Result<&mut Self> {
            const WIDTH: usize = std::mem::size_of::<$ty>();
            let total = v.len().checked_mul(WIDTH).unwrap_or(usize::MAX);
            let start = self.claim_write(total)?;
            for (i, item) in v.iter().enumerate() {
                let bytes = match self.order {
                    crate::ByteOrder::Big => item.to_be_bytes(),
                    crate::ByteOrder::Little => item.to_le_bytes(),
                };
                let at = start + i * WIDTH;
                self.data[at..at + WIDTH].copy_from_slice(&bytes);
            }
            Ok(self)
        }

        #[doc = concat!("Reads `count` values of `", stringify!($ty), "`.")]
        pub fn $get_seq(&mut self, count: usize) -> crate::Result<Vec<$ty>> {
            const WIDTH: usize = std::mem::size_of::<$ty>();
            let total = count.checked_mul(WIDTH).unwrap_or(usize::MAX);
            let start = self.claim_read(total)?;
            let mut out = Vec::with_capacity(count);
            for i in 0..count {
                let at = start + i * WIDTH;
                let mut bytes = [0u8; WIDTH];
                bytes.copy_from_slice(&self.data[at..at + WIDTH]);
                out.push(match self.order {
                    crate::ByteOrder::Big => <$ty>::from_be_bytes(bytes),
                    crate::ByteOrder::Little => <$ty>::from_le_bytes(bytes),
                });
            }
            Ok(out)
        }

        #[doc = concat!("Writes a `", stringify!($ty), "` at an absolute index without moving the cursor.")]
        pub fn $put_at(&mut self, index: usize, v: $ty) -> crate::Result<&mut Self> {
            const WIDTH: usize = std::mem::size_of::<$ty>();
            self.check_absolute(index, WIDTH)?;
            let bytes = match self.order {
                crate::ByteOrder::Big => v.to_be_bytes(),
                crate::ByteOrder::Little => v.to_le_bytes(),
            };
            self.data[index..index + WIDTH].copy_from_slice(&bytes);
            Ok(self)
        }

        #[doc = concat!("Reads a `", stringify!($ty), "` at an absolute index without moving the cursor.")]
        pub fn $get_at(&self, index: usize) -> crate::Result<$ty> {
            const WIDTH: usize = std::mem::size_of::<$ty>();
            self.check_absolute(index, WIDTH)?;
            let mut bytes = [0u8; WIDTH];
            bytes.copy_from_slice(&self.data[index..index + WIDTH]);
            Ok(match self.order {
                crate::ByteOrder::Big => <$ty>::from_be_bytes(bytes),
                crate::ByteOrder::Little => <$ty>::from_le_bytes(bytes),
            })
        }
    };
}

pub(crate) use for_each_multibyte;
pub(crate) use impl_multibyte;
