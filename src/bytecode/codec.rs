//! Binary container for compiled programs.
//!
//! Layout (all little-endian):
//!
//! ```text
//! u32 magic      0x53574150
//! u32 version    1
//! u32 constant_count
//! u32 instruction_count
//! constants      1-byte tag each, then the tag-specific payload
//! instructions   u32 each (the low 32 bits of the packed word)
//! ```
//!
//! The wire instruction is 32 bits wide, so the `C` operand is not
//! representable; serialization rejects any instruction carrying one rather
//! than silently truncating it.

use super::{
    Constant, Instruction, TAG_BOOLEAN, TAG_FLOAT, TAG_INTEGER, TAG_STRING,
};

pub const MAGIC: u32 = 0x5357_4150;
pub const VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid magic number: {0:#010x}")]
    BadMagic(u32),
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u32),
    #[error("truncated stream while reading {0}")]
    Truncated(&'static str),
    #[error("unknown constant tag: {0}")]
    UnknownConstantTag(u8),
    #[error("string constant {0} is not valid UTF-8")]
    InvalidUtf8(usize),
    #[error("instruction {index} carries operand C={c}, which the 32-bit wire format cannot represent")]
    WideOperand { index: usize, c: u8 },
}

pub fn serialize(
    instructions: &[Instruction],
    constants: &[Constant],
) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(16 + instructions.len() * 4);
    out.extend_from_slice(&MAGIC.to_le_bytes());
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&(constants.len() as u32).to_le_bytes());
    out.extend_from_slice(&(instructions.len() as u32).to_le_bytes());

    for constant in constants {
        write_constant(&mut out, constant);
    }

    for (index, instruction) in instructions.iter().enumerate() {
        let c = instruction.c();
        if c != 0 {
            return Err(CodecError::WideOperand { index, c });
        }
        out.extend_from_slice(&instruction.to_wire().to_le_bytes());
    }

    Ok(out)
}

fn write_constant(out: &mut Vec<u8>, constant: &Constant) {
    out.push(constant.tag());
    match constant {
        Constant::Str(s) => {
            out.extend_from_slice(&(s.len() as u32).to_le_bytes());
            out.extend_from_slice(s.as_bytes());
        }
        Constant::Int(n) => out.extend_from_slice(&n.to_le_bytes()),
        Constant::Float(x) => out.extend_from_slice(&x.to_bits().to_le_bytes()),
        Constant::Bool(b) => out.push(*b as u8),
    }
}

pub fn deserialize(bytes: &[u8]) -> Result<(Vec<Instruction>, Vec<Constant>), CodecError> {
    let mut reader = Reader { bytes, pos: 0 };

    let magic = reader.u32("header")?;
    if magic != MAGIC {
        return Err(CodecError::BadMagic(magic));
    }
    let version = reader.u32("header")?;
    if version != VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }
    let constant_count = reader.u32("header")? as usize;
    let instruction_count = reader.u32("header")? as usize;

    // Counts come from the wire; cap the pre-allocation so a corrupt header
    // cannot demand gigabytes up front.
    let mut constants = Vec::with_capacity(constant_count.min(1024));
    for index in 0..constant_count {
        constants.push(read_constant(&mut reader, index)?);
    }

    let mut instructions = Vec::with_capacity(instruction_count.min(4096));
    for _ in 0..instruction_count {
        instructions.push(Instruction::from_wire(reader.u32("instruction")?));
    }

    Ok((instructions, constants))
}

fn read_constant(reader: &mut Reader<'_>, index: usize) -> Result<Constant, CodecError> {
    let tag = reader.u8("constant tag")?;
    match tag {
        TAG_STRING => {
            let len = reader.u32("string length")? as usize;
            let raw = reader.take(len, "string constant")?;
            let text = std::str::from_utf8(raw).map_err(|_| CodecError::InvalidUtf8(index))?;
            Ok(Constant::Str(text.to_string()))
        }
        TAG_INTEGER => Ok(Constant::Int(reader.u64("integer constant")? as i64)),
        TAG_FLOAT => Ok(Constant::Float(f64::from_bits(reader.u64("float constant")?))),
        TAG_BOOLEAN => Ok(Constant::Bool(reader.u8("boolean constant")? != 0)),
        other => Err(CodecError::UnknownConstantTag(other)),
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], CodecError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(CodecError::Truncated(what))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self, what: &'static str) -> Result<u8, CodecError> {
        Ok(self.take(1, what)?[0])
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, CodecError> {
        let raw = self.take(4, what)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn u64(&mut self, what: &'static str) -> Result<u64, CodecError> {
        let raw = self.take(8, what)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(raw);
        Ok(u64::from_le_bytes(buf))
    }
}
