//! Fixed-size scalar encodings
//!
//! Scalars are written as their raw native-endian representation.

use std::io::{self, Read, Write};

use super::{invalid_data, Codec};

macro_rules! impl_scalar_codec {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Codec for $ty {
                fn encode<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<usize> {
                    let bytes = self.to_ne_bytes();
                    writer.write_all(&bytes)?;
                    Ok(bytes.len())
                }

                fn decode<R: Read + ?Sized>(reader: &mut R) -> io::Result<(Self, usize)> {
                    let mut bytes = [0u8; std::mem::size_of::<$ty>()];
                    reader.read_exact(&mut bytes)?;
                    Ok((<$ty>::from_ne_bytes(bytes), bytes.len()))
                }
            }
        )*
    };
}

impl_scalar_codec!(u8, u16, u32, u64, i32, i64, usize, f32, f64);

impl Codec for bool {
    fn encode<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<usize> {
        u8::from(*self).encode(writer)
    }

    fn decode<R: Read + ?Sized>(reader: &mut R) -> io::Result<(Self, usize)> {
        let (byte, n) = u8::decode(reader)?;
        match byte {
            0 => Ok((false, n)),
            1 => Ok((true, n)),
            other => Err(invalid_data(format!("Invalid boolean byte: {:#04x}", other))),
        }
    }
}
