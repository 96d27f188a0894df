//! 字节缓冲区模块
//!
//! 写入端 [`Buffer`] 基于 `BytesMut`，按需扩容；读取端 [`Reader`] 是对已有字节切片的只读视图。
//! 两者都不了解模式，只负责定宽数值、变长整数与带长度前缀的字符串。

use bytes::{Bytes, BytesMut};
use jsonpack_common::{ByteOrder, Limits, MIN_BUFFER_CAPACITY};
use thiserror::Error;

/// 64 位变长整数最多占用的字节数
pub const MAX_VARINT_LEN: usize = 10;

/// 缓冲区越界类错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// 读取越过逻辑末尾
    #[error("read exceeds buffer length: need {need} bytes at offset {offset}, length {len}")]
    Overread { offset: usize, need: usize, len: usize },

    /// 回退到起点之前
    #[error("read offset is less than zero: rewind {count} bytes at offset {offset}")]
    Underread { offset: usize, count: usize },

    /// 无效的定位
    #[error("seek offset {position} is invalid, length {len}")]
    Seek { position: i64, len: usize },

    /// 长度前缀超出限制或超出剩余输入
    #[error("invalid length {length}, limit {limit}")]
    InvalidLength { length: u64, limit: u64 },

    #[error("varint exceeds 64 bits")]
    VarintOverflow,

    #[error("invalid UTF-8 string: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

pub type BufferResult<T> = Result<T, BufferError>;

/// 计算无符号变长整数的编码长度
///
/// # Brief
/// 不写入数据，直接返回 `x` 编码后的精确字节数
pub fn var_uint_len(x: u64) -> usize {
    let bits = 64 - (x | 1).leading_zeros() as usize;
    (bits + 6) / 7
}

/// 计算有符号（zig-zag）变长整数的编码长度
pub fn var_int_len(x: i64) -> usize {
    var_uint_len(zigzag(x))
}

#[inline]
fn zigzag(x: i64) -> u64 {
    ((x << 1) ^ (x >> 63)) as u64
}

#[inline]
fn unzigzag(x: u64) -> i64 {
    ((x >> 1) as i64) ^ -((x & 1) as i64)
}

fn put_var_uint(out: &mut [u8; MAX_VARINT_LEN], mut x: u64) -> usize {
    let mut i = 0;
    while x >= 0x80 {
        out[i] = (x as u8) | 0x80;
        x >>= 7;
        i += 1;
    }
    out[i] = x as u8;
    i + 1
}

/// 可增长的写缓冲区
///
/// 维护 `0 <= offset <= len <= capacity`，其中 `len` 是写入过的最高位置。
#[derive(Debug, Default)]
pub struct Buffer {
    data: BytesMut,
    offset: usize,
}

impl Buffer {
    /// 创建预分配容量的缓冲区（至少 64 字节）
    pub fn with_capacity(size: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(size.max(MIN_BUFFER_CAPACITY)),
            offset: 0,
        }
    }

    /// 复用调用方已有的内存，原有内容被清空
    pub fn from_bytes_mut(mut data: BytesMut) -> Self {
        data.clear();
        Self { data, offset: 0 }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// 已写入的前缀 `[0, offset)`
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.offset]
    }

    fn reserve_for(&mut self, n: usize) {
        let end = self.offset + n;
        if end <= self.data.capacity() {
            return;
        }
        // 至少翻倍，摊薄重新分配的次数
        let additional = (end - self.data.len()).max(self.data.capacity());
        tracing::trace!(
            capacity = self.data.capacity(),
            additional,
            "growing encode buffer"
        );
        self.data.reserve(additional);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.reserve_for(bytes.len());
        let end = self.offset + bytes.len();
        if self.offset == self.data.len() {
            self.data.extend_from_slice(bytes);
        } else {
            let overlap = (self.data.len() - self.offset).min(bytes.len());
            self.data[self.offset..self.offset + overlap].copy_from_slice(&bytes[..overlap]);
            self.data.extend_from_slice(&bytes[overlap..]);
        }
        self.offset = end;
    }

    pub fn write_u8(&mut self, value: u8) {
        self.write_bytes(&[value]);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.write_u8(value as u8);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(value as u8);
    }

    /// 写入无符号变长整数，返回写入的字节数
    pub fn write_var_uint(&mut self, value: u64) -> usize {
        let mut tmp = [0u8; MAX_VARINT_LEN];
        let n = put_var_uint(&mut tmp, value);
        self.write_bytes(&tmp[..n]);
        n
    }

    /// 写入 zig-zag 编码的有符号变长整数，返回写入的字节数
    pub fn write_var_int(&mut self, value: i64) -> usize {
        self.write_var_uint(zigzag(value))
    }

    /// 写入带变长长度前缀的 UTF-8 字符串
    pub fn write_str(&mut self, value: &str) {
        self.write_var_uint(value.len() as u64);
        self.write_bytes(value.as_bytes());
    }

    /// 定位游标
    ///
    /// # Arguments
    /// * `offset` - 偏移量
    /// * `relative` - 为 true 时相对当前位置，否则为绝对位置
    ///
    /// # Returns
    /// 目标位置不在 `[0, len]` 内时返回 `BufferError::Seek`
    pub fn seek(&mut self, offset: i64, relative: bool) -> BufferResult<()> {
        let position = if relative {
            self.offset as i64 + offset
        } else {
            offset
        };
        if position < 0 || position as usize > self.data.len() {
            return Err(BufferError::Seek {
                position,
                len: self.data.len(),
            });
        }
        self.offset = position as usize;
        Ok(())
    }

    /// 不做边界检查的定位，调用方负责位置有效
    pub fn seek_unchecked(&mut self, position: usize) {
        debug_assert!(position <= self.data.len());
        self.offset = position;
    }

    /// 取出 `[0, offset)` 作为最终输出，不拷贝
    pub fn seal(self) -> Bytes {
        self.into_bytes_mut().freeze()
    }

    pub fn into_bytes_mut(self) -> BytesMut {
        let mut data = self.data;
        data.truncate(self.offset);
        data
    }
}

/// 只读字节视图
///
/// 所有读取都经过边界检查，游标永远不会越过输入长度。
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
    limits: Limits,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_limits(data, Limits::default())
    }

    pub fn with_limits(data: &'a [u8], limits: Limits) -> Self {
        Self {
            data,
            offset: 0,
            limits,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn read_bytes(&mut self, n: usize) -> BufferResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(BufferError::Overread {
                offset: self.offset,
                need: n,
                len: self.data.len(),
            });
        }
        let bytes = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> BufferResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn skip(&mut self, n: usize) -> BufferResult<()> {
        self.read_bytes(n).map(|_| ())
    }

    pub fn read_u8(&mut self) -> BufferResult<u8> {
        match self.data.get(self.offset) {
            Some(&b) => {
                self.offset += 1;
                Ok(b)
            }
            None => Err(BufferError::Overread {
                offset: self.offset,
                need: 1,
                len: self.data.len(),
            }),
        }
    }

    pub fn read_i8(&mut self) -> BufferResult<i8> {
        self.read_u8().map(|b| b as i8)
    }

    /// 非零即为 true
    pub fn read_bool(&mut self) -> BufferResult<bool> {
        self.read_u8().map(|b| b != 0)
    }

    pub fn read_var_uint(&mut self) -> BufferResult<u64> {
        let mut result: u64 = 0;
        let mut shift = 0;
        for i in 0..MAX_VARINT_LEN {
            let byte = self.read_u8()?;
            if i == MAX_VARINT_LEN - 1 && byte > 1 {
                return Err(BufferError::VarintOverflow);
            }
            result |= ((byte & 0x7f) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
        Err(BufferError::VarintOverflow)
    }

    pub fn read_var_int(&mut self) -> BufferResult<i64> {
        self.read_var_uint().map(unzigzag)
    }

    /// 读取数组元素个数
    ///
    /// # Brief
    /// 在分配任何内存之前，用配置上限和剩余字节数校验长度前缀。
    /// 元素可以不占字节（例如没有属性的对象），此时几个字节的前缀
    /// 就能声明大量元素，只有 `max_array_length` 约束元素个数
    ///
    /// # Arguments
    /// * `min_item_size` - 单个元素在线上的最小字节数
    pub fn read_len(&mut self, min_item_size: usize) -> BufferResult<usize> {
        let count = self.read_var_uint()?;
        let max = self.limits.max_array_length as u64;
        if count > max {
            return Err(BufferError::InvalidLength {
                length: count,
                limit: max,
            });
        }
        if min_item_size > 0 {
            let fits = (self.remaining() / min_item_size) as u64;
            if count > fits {
                return Err(BufferError::InvalidLength {
                    length: count,
                    limit: fits,
                });
            }
        }
        Ok(count as usize)
    }

    /// 读取带长度前缀的字符串，借用输入而不拷贝
    pub fn read_str(&mut self) -> BufferResult<&'a str> {
        let len = self.read_var_uint()?;
        let max = self.limits.max_string_length as u64;
        if len > max {
            return Err(BufferError::InvalidLength { length: len, limit: max });
        }
        if len > self.remaining() as u64 {
            return Err(BufferError::Overread {
                offset: self.offset,
                need: len as usize,
                len: self.data.len(),
            });
        }
        let bytes = self.read_bytes(len as usize)?;
        Ok(std::str::from_utf8(bytes)?)
    }

    pub fn seek(&mut self, offset: i64, relative: bool) -> BufferResult<()> {
        let position = if relative {
            self.offset as i64 + offset
        } else {
            offset
        };
        if position < 0 || position as usize > self.data.len() {
            return Err(BufferError::Seek {
                position,
                len: self.data.len(),
            });
        }
        self.offset = position as usize;
        Ok(())
    }

    pub fn seek_unchecked(&mut self, position: usize) {
        debug_assert!(position <= self.data.len());
        self.offset = position;
    }

    /// 回退 `count` 字节，用于“先窥视长度再回退”
    pub fn rewind(&mut self, count: usize) -> BufferResult<()> {
        if count > self.offset {
            return Err(BufferError::Underread {
                offset: self.offset,
                count,
            });
        }
        self.offset -= count;
        Ok(())
    }
}

macro_rules! fixed_width {
    ($($write:ident, $read:ident, $ty:ty;)*) => {
        impl Buffer {
            $(
                pub fn $write(&mut self, value: $ty, order: ByteOrder) {
                    match order {
                        ByteOrder::Little => self.write_bytes(&value.to_le_bytes()),
                        ByteOrder::Big => self.write_bytes(&value.to_be_bytes()),
                    }
                }
            )*
        }

        impl<'a> Reader<'a> {
            $(
                pub fn $read(&mut self, order: ByteOrder) -> BufferResult<$ty> {
                    let bytes = self.read_array::<{ std::mem::size_of::<$ty>() }>()?;
                    Ok(match order {
                        ByteOrder::Little => <$ty>::from_le_bytes(bytes),
                        ByteOrder::Big => <$ty>::from_be_bytes(bytes),
                    })
                }
            )*
        }
    };
}

fixed_width! {
    write_i16, read_i16, i16;
    write_i32, read_i32, i32;
    write_i64, read_i64, i64;
    write_u16, read_u16, u16;
    write_u32, read_u32, u32;
    write_u64, read_u64, u64;
    write_f32, read_f32, f32;
    write_f64, read_f64, f64;
}
