//! Portable binary preset codec.
//!
//! Presets travel in the wrapped protocol's program/bank format. Four
//! variants share one header and differ in payload:
//!
//! ```text
//! magic(4) size(4) formatTag(4) version(4) ownerId(4) ownerVersion(4)
//! FxCk  program, flat: paramCount(4) name(28) param0..paramN(4 each)
//! FPCh  program, opaque: paramCount(4) name(28) chunkSize(4) chunk
//! FxBk  bank, flat: programCount(4) reserved(128) FxCk block per program
//! FBCh  bank, opaque: programCount(4) reserved(128) chunkSize(4) chunk
//! ```
//!
//! All integers and floats are big-endian. `size` counts the bytes after the
//! size field itself.
//!
//! # Decoding
//!
//! [`PresetBinary::decode`] validates magic, declared size, format version
//! and owner identity before it looks at the payload. Running out of bytes is
//! a [`SymbiosisError::Bounds`] fault, anything else malformed a
//! [`SymbiosisError::Format`] fault.
//!
//! [`load_preset`] applies a decoded preset to a live plug-in. Count
//! mismatches between file and plug-in do not fail the load: the overlapping
//! subset is applied and the result is [`LoadOutcome::Imperfect`]. A flat
//! bank is only read as far as the plug-in has programs, so program blocks
//! beyond that are never looked at.
//!
//! # Encoding
//!
//! [`PresetBinary::encode`] always recomputes size and count fields from the
//! payload it writes.

use crate::config::FourCharCode;
use crate::error::{Result, SymbiosisError};
use crate::fourcc;
use crate::plugin::{truncate_name, WrappedPlugin};

pub const CHUNK_MAGIC: FourCharCode = fourcc!(b"CcnK");
pub const PROGRAM_TAG: FourCharCode = fourcc!(b"FxCk");
pub const PROGRAM_CHUNK_TAG: FourCharCode = fourcc!(b"FPCh");
pub const BANK_TAG: FourCharCode = fourcc!(b"FxBk");
pub const BANK_CHUNK_TAG: FourCharCode = fourcc!(b"FBCh");

/// Format version written and accepted.
pub const FORMAT_VERSION: u32 = 1;

const HEADER_SIZE: usize = 24;
const NAME_FIELD_SIZE: usize = 28;
const BANK_RESERVED_SIZE: usize = 128;

/// One flat program: a name and its normalized parameter values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgramBlock {
    pub name: String,
    pub parameters: Vec<f32>,
}

impl ProgramBlock {
    fn encoded_len(&self) -> usize {
        HEADER_SIZE + 4 + NAME_FIELD_SIZE + self.parameters.len() * 4
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PresetPayload {
    Program(ProgramBlock),
    ProgramChunk {
        parameter_count: u32,
        name: String,
        chunk: Vec<u8>,
    },
    Bank(Vec<ProgramBlock>),
    BankChunk {
        program_count: u32,
        chunk: Vec<u8>,
    },
}

/// A decoded program or bank together with the identity of its owner.
#[derive(Debug, Clone, PartialEq)]
pub struct PresetBinary {
    pub owner_id: i32,
    pub owner_version: i32,
    pub payload: PresetPayload,
}

/// Result of applying a preset to a live plug-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Everything in the preset was applied as stored.
    Perfect,
    /// Counts differed, values needed clamping or the plug-in refused a chunk.
    Imperfect,
}

impl LoadOutcome {
    fn degrade(&mut self, perfect: bool) {
        if !perfect {
            *self = LoadOutcome::Imperfect;
        }
    }
}

// =============================================================================
// Byte cursor
// =============================================================================

struct Reader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self
            .position
            .checked_add(count)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| {
                SymbiosisError::Bounds(format!(
                    "needed {} bytes at offset {}, only {} available",
                    count,
                    self.position,
                    self.bytes.len().saturating_sub(self.position)
                ))
            })?;
        let slice = &self.bytes[self.position..end];
        self.position = end;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32> {
        let raw = self.take(4)?;
        Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(self.u32()? as i32)
    }

    fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.u32()?))
    }

    fn code(&mut self) -> Result<FourCharCode> {
        Ok(FourCharCode::from_u32(self.u32()?))
    }

    fn name(&mut self) -> Result<String> {
        let raw = self.take(NAME_FIELD_SIZE)?;
        let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }

    fn skip(&mut self, count: usize) -> Result<()> {
        self.take(count).map(|_| ())
    }
}

struct Header {
    size: u32,
    tag: FourCharCode,
    version: u32,
    owner_id: i32,
    owner_version: i32,
}

fn read_header(reader: &mut Reader<'_>) -> Result<Header> {
    let magic = reader.code()?;
    if magic != CHUNK_MAGIC {
        return Err(SymbiosisError::Format(format!("bad magic '{}'", magic)));
    }
    Ok(Header {
        size: reader.u32()?,
        tag: reader.code()?,
        version: reader.u32()?,
        owner_id: reader.i32()?,
        owner_version: reader.i32()?,
    })
}

fn check_header(header: &Header, expected_owner: i32) -> Result<()> {
    if header.version != FORMAT_VERSION {
        return Err(SymbiosisError::Format(format!(
            "unsupported format version {}",
            header.version
        )));
    }
    if header.owner_id != expected_owner {
        return Err(SymbiosisError::Format(format!(
            "preset belongs to plug-in {:#010x}, expected {:#010x}",
            header.owner_id, expected_owner
        )));
    }
    Ok(())
}

fn read_program_block(reader: &mut Reader<'_>, expected_owner: i32) -> Result<ProgramBlock> {
    let header = read_header(reader)?;
    if header.tag != PROGRAM_TAG {
        return Err(SymbiosisError::Format(format!(
            "expected program block, found '{}'",
            header.tag
        )));
    }
    check_header(&header, expected_owner)?;
    read_program_body(reader)
}

fn read_program_body(reader: &mut Reader<'_>) -> Result<ProgramBlock> {
    let count = reader.u32()? as usize;
    let name = reader.name()?;
    // Bounded by the data actually present, not the declared count.
    let mut parameters = Vec::with_capacity(count.min(reader.bytes.len() / 4));
    for _ in 0..count {
        parameters.push(reader.f32()?);
    }
    Ok(ProgramBlock { name, parameters })
}

fn read_chunk(reader: &mut Reader<'_>) -> Result<Vec<u8>> {
    let size = reader.i32()?;
    if size < 0 {
        return Err(SymbiosisError::Format(format!("negative chunk size {}", size)));
    }
    Ok(reader.take(size as usize)?.to_vec())
}

// =============================================================================
// Byte writer
// =============================================================================

struct Writer {
    bytes: Vec<u8>,
}

impl Writer {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    fn u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    fn i32(&mut self, value: i32) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    fn f32(&mut self, value: f32) {
        self.u32(value.to_bits());
    }

    fn code(&mut self, code: FourCharCode) {
        self.u32(code.as_u32());
    }

    fn name(&mut self, name: &str) {
        let mut field = [0u8; NAME_FIELD_SIZE];
        // Keep a terminating zero and whole characters.
        let mut len = name.len().min(NAME_FIELD_SIZE - 1);
        while !name.is_char_boundary(len) {
            len -= 1;
        }
        field[..len].copy_from_slice(&name.as_bytes()[..len]);
        self.bytes.extend_from_slice(&field);
    }

    fn header(&mut self, total_len: usize, tag: FourCharCode, owner_id: i32, owner_version: i32) {
        self.code(CHUNK_MAGIC);
        self.u32((total_len - 8) as u32);
        self.code(tag);
        self.u32(FORMAT_VERSION);
        self.i32(owner_id);
        self.i32(owner_version);
    }

    fn program_block(&mut self, block: &ProgramBlock, owner_id: i32, owner_version: i32) {
        self.header(block.encoded_len(), PROGRAM_TAG, owner_id, owner_version);
        self.u32(block.parameters.len() as u32);
        self.name(&block.name);
        for value in &block.parameters {
            self.f32(*value);
        }
    }
}

// =============================================================================
// PresetBinary
// =============================================================================

impl PresetBinary {
    /// Decode a program or bank, checking that it belongs to `expected_owner`.
    pub fn decode(bytes: &[u8], expected_owner: i32) -> Result<Self> {
        Self::decode_programs(bytes, expected_owner, usize::MAX).map(|(preset, _)| preset)
    }

    /// Like [`decode`](Self::decode), but reads at most `program_limit`
    /// program blocks of a flat bank. The flag is set when the bank declares
    /// more programs than were read.
    pub fn decode_programs(bytes: &[u8], expected_owner: i32, program_limit: usize) -> Result<(Self, bool)> {
        let mut skipped_programs = false;
        let mut reader = Reader::new(bytes);
        let header = read_header(&mut reader)?;
        if header.size as usize + 8 > bytes.len() {
            return Err(SymbiosisError::Format(format!(
                "declared size {} exceeds {} available bytes",
                header.size,
                bytes.len()
            )));
        }
        check_header(&header, expected_owner)?;

        let payload = match header.tag {
            tag if tag == PROGRAM_TAG => PresetPayload::Program(read_program_body(&mut reader)?),
            tag if tag == PROGRAM_CHUNK_TAG => {
                let parameter_count = reader.u32()?;
                let name = reader.name()?;
                let chunk = read_chunk(&mut reader)?;
                PresetPayload::ProgramChunk {
                    parameter_count,
                    name,
                    chunk,
                }
            }
            tag if tag == BANK_TAG => {
                let declared = reader.u32()? as usize;
                reader.skip(BANK_RESERVED_SIZE)?;
                let count = declared.min(program_limit);
                skipped_programs = count < declared;
                let mut programs = Vec::with_capacity(count.min(bytes.len() / HEADER_SIZE));
                for _ in 0..count {
                    programs.push(read_program_block(&mut reader, expected_owner)?);
                }
                PresetPayload::Bank(programs)
            }
            tag if tag == BANK_CHUNK_TAG => {
                let program_count = reader.u32()?;
                reader.skip(BANK_RESERVED_SIZE)?;
                let chunk = read_chunk(&mut reader)?;
                PresetPayload::BankChunk {
                    program_count,
                    chunk,
                }
            }
            other => {
                return Err(SymbiosisError::Format(format!("unknown format tag '{}'", other)));
            }
        };

        let preset = Self {
            owner_id: header.owner_id,
            owner_version: header.owner_version,
            payload,
        };
        Ok((preset, skipped_programs))
    }

    /// Encode with canonical size and count fields.
    pub fn encode(&self) -> Vec<u8> {
        let (owner_id, owner_version) = (self.owner_id, self.owner_version);
        match &self.payload {
            PresetPayload::Program(block) => {
                let mut writer = Writer::with_capacity(block.encoded_len());
                writer.program_block(block, owner_id, owner_version);
                writer.bytes
            }
            PresetPayload::ProgramChunk {
                parameter_count,
                name,
                chunk,
            } => {
                let total = HEADER_SIZE + 4 + NAME_FIELD_SIZE + 4 + chunk.len();
                let mut writer = Writer::with_capacity(total);
                writer.header(total, PROGRAM_CHUNK_TAG, owner_id, owner_version);
                writer.u32(*parameter_count);
                writer.name(name);
                writer.u32(chunk.len() as u32);
                writer.bytes.extend_from_slice(chunk);
                writer.bytes
            }
            PresetPayload::Bank(programs) => {
                let total = HEADER_SIZE
                    + 4
                    + BANK_RESERVED_SIZE
                    + programs.iter().map(ProgramBlock::encoded_len).sum::<usize>();
                let mut writer = Writer::with_capacity(total);
                writer.header(total, BANK_TAG, owner_id, owner_version);
                writer.u32(programs.len() as u32);
                writer.bytes.extend_from_slice(&[0u8; BANK_RESERVED_SIZE]);
                for block in programs {
                    writer.program_block(block, owner_id, owner_version);
                }
                writer.bytes
            }
            PresetPayload::BankChunk {
                program_count,
                chunk,
            } => {
                let total = HEADER_SIZE + 4 + BANK_RESERVED_SIZE + 4 + chunk.len();
                let mut writer = Writer::with_capacity(total);
                writer.header(total, BANK_CHUNK_TAG, owner_id, owner_version);
                writer.u32(*program_count);
                writer.bytes.extend_from_slice(&[0u8; BANK_RESERVED_SIZE]);
                writer.u32(chunk.len() as u32);
                writer.bytes.extend_from_slice(chunk);
                writer.bytes
            }
        }
    }

    pub fn is_bank(&self) -> bool {
        matches!(
            self.payload,
            PresetPayload::Bank(_) | PresetPayload::BankChunk { .. }
        )
    }

    pub fn format_tag(&self) -> FourCharCode {
        match self.payload {
            PresetPayload::Program(_) => PROGRAM_TAG,
            PresetPayload::ProgramChunk { .. } => PROGRAM_CHUNK_TAG,
            PresetPayload::Bank(_) => BANK_TAG,
            PresetPayload::BankChunk { .. } => BANK_CHUNK_TAG,
        }
    }
}

// =============================================================================
// Capture from and apply to a live plug-in
// =============================================================================

fn capture_program_block<P: WrappedPlugin + ?Sized>(plugin: &mut P) -> ProgramBlock {
    let name = plugin.current_program_name();
    let parameters = (0..plugin.parameter_count())
        .map(|index| plugin.parameter(index))
        .collect();
    ProgramBlock { name, parameters }
}

fn opaque_chunk<P: WrappedPlugin + ?Sized>(plugin: &mut P, is_program: bool) -> Result<Vec<u8>> {
    match plugin.chunk(is_program) {
        Some(chunk) if !chunk.is_empty() => Ok(chunk),
        _ => Err(SymbiosisError::Foreign(
            "plug-in returned an empty state chunk".to_string(),
        )),
    }
}

/// Capture the current program of `plugin`.
pub fn capture_program<P: WrappedPlugin + ?Sized>(plugin: &mut P) -> Result<PresetBinary> {
    let payload = if plugin.flags().program_chunks {
        let chunk = opaque_chunk(plugin, true)?;
        PresetPayload::ProgramChunk {
            parameter_count: plugin.parameter_count() as u32,
            name: plugin.current_program_name(),
            chunk,
        }
    } else {
        PresetPayload::Program(capture_program_block(plugin))
    };
    Ok(PresetBinary {
        owner_id: plugin.unique_id(),
        owner_version: plugin.version(),
        payload,
    })
}

/// Capture every program of `plugin` as a bank.
///
/// The flat variant walks the programs; the previously selected program is
/// restored afterwards.
pub fn capture_bank<P: WrappedPlugin + ?Sized>(plugin: &mut P) -> Result<PresetBinary> {
    let payload = if plugin.flags().program_chunks {
        PresetPayload::BankChunk {
            program_count: plugin.program_count() as u32,
            chunk: opaque_chunk(plugin, false)?,
        }
    } else {
        let previous = plugin.current_program();
        let programs = (0..plugin.program_count())
            .map(|program| {
                plugin.set_current_program(program);
                capture_program_block(plugin)
            })
            .collect();
        plugin.set_current_program(previous);
        PresetPayload::Bank(programs)
    };
    Ok(PresetBinary {
        owner_id: plugin.unique_id(),
        owner_version: plugin.version(),
        payload,
    })
}

/// Encode the current program of `plugin`.
pub fn create_program_preset<P: WrappedPlugin + ?Sized>(plugin: &mut P) -> Result<Vec<u8>> {
    Ok(capture_program(plugin)?.encode())
}

/// Encode the whole bank of `plugin`.
pub fn create_bank_preset<P: WrappedPlugin + ?Sized>(plugin: &mut P) -> Result<Vec<u8>> {
    Ok(capture_bank(plugin)?.encode())
}

fn apply_program_block<P: WrappedPlugin + ?Sized>(plugin: &mut P, block: &ProgramBlock) -> LoadOutcome {
    let mut outcome = LoadOutcome::Perfect;
    let live_count = plugin.parameter_count();
    outcome.degrade(block.parameters.len() == live_count);

    plugin.set_current_program_name(&truncate_name(&block.name));
    plugin.begin_set_program();
    for index in 0..live_count {
        // Parameters missing from the file are reset to zero.
        let stored = block.parameters.get(index).copied().unwrap_or(0.0);
        let value = if stored.is_nan() { 0.0 } else { stored.clamp(0.0, 1.0) };
        outcome.degrade(value == stored);
        plugin.set_parameter(index, value);
    }
    plugin.end_set_program();
    outcome
}

/// Apply an already decoded preset to `plugin`.
pub fn apply_preset<P: WrappedPlugin + ?Sized>(plugin: &mut P, preset: &PresetBinary) -> LoadOutcome {
    match &preset.payload {
        PresetPayload::Program(block) => apply_program_block(plugin, block),
        PresetPayload::ProgramChunk { name, chunk, .. } => {
            plugin.set_current_program_name(&truncate_name(name));
            if plugin.set_chunk(true, chunk) {
                LoadOutcome::Perfect
            } else {
                LoadOutcome::Imperfect
            }
        }
        PresetPayload::Bank(programs) => {
            let mut outcome = LoadOutcome::Perfect;
            let live_count = plugin.program_count();
            outcome.degrade(programs.len() == live_count);

            let previous = plugin.current_program();
            for (program, block) in programs.iter().take(live_count).enumerate() {
                plugin.set_current_program(program);
                outcome.degrade(apply_program_block(plugin, block) == LoadOutcome::Perfect);
            }
            plugin.set_current_program(previous);
            outcome
        }
        PresetPayload::BankChunk { chunk, .. } => {
            if plugin.set_chunk(false, chunk) {
                LoadOutcome::Perfect
            } else {
                LoadOutcome::Imperfect
            }
        }
    }
}

/// Decode `bytes` and apply the program or bank to `plugin`.
pub fn load_preset<P: WrappedPlugin + ?Sized>(plugin: &mut P, bytes: &[u8]) -> Result<LoadOutcome> {
    let (preset, skipped_programs) =
        PresetBinary::decode_programs(bytes, plugin.unique_id(), plugin.program_count())?;
    let mut outcome = apply_preset(plugin, &preset);
    outcome.degrade(!skipped_programs);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPlugin;

    const OWNER: i32 = 0x5379_4465;

    fn flat_bank(programs: usize, parameters: usize) -> PresetBinary {
        PresetBinary {
            owner_id: OWNER,
            owner_version: 3,
            payload: PresetPayload::Bank(
                (0..programs)
                    .map(|p| ProgramBlock {
                        name: format!("Program {}", p),
                        parameters: (0..parameters)
                            .map(|i| ((p * parameters + i) % 10) as f32 / 10.0)
                            .collect(),
                    })
                    .collect(),
            ),
        }
    }

    #[test]
    fn test_program_layout() {
        let preset = PresetBinary {
            owner_id: OWNER,
            owner_version: 1,
            payload: PresetPayload::Program(ProgramBlock {
                name: "Init".into(),
                parameters: vec![0.25, 1.0],
            }),
        };
        let bytes = preset.encode();
        assert_eq!(bytes.len(), 56 + 2 * 4);
        assert_eq!(&bytes[0..4], b"CcnK");
        assert_eq!(u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]), 64 - 8);
        assert_eq!(&bytes[8..12], b"FxCk");
        assert_eq!(&bytes[28..32], &2u32.to_be_bytes());
        assert_eq!(&bytes[32..36], b"Init");
        assert_eq!(&bytes[56..60], &0.25f32.to_be_bytes());
    }

    #[test]
    fn test_bank_chunk_layout() {
        let preset = PresetBinary {
            owner_id: OWNER,
            owner_version: 1,
            payload: PresetPayload::BankChunk {
                program_count: 16,
                chunk: vec![1, 2, 3],
            },
        };
        let bytes = preset.encode();
        assert_eq!(bytes.len(), 160 + 3);
        assert_eq!(&bytes[8..12], b"FBCh");
        assert_eq!(&bytes[156..160], &3u32.to_be_bytes());
        assert_eq!(PresetBinary::decode(&bytes, OWNER).unwrap(), preset);
    }

    #[test]
    fn test_bank_decode_encode_decode_preserves_parameters() {
        let original = flat_bank(4, 5).encode();
        let first = PresetBinary::decode(&original, OWNER).unwrap();
        let second = PresetBinary::decode(&first.encode(), OWNER).unwrap();
        let (PresetPayload::Bank(a), PresetPayload::Bank(b)) = (&first.payload, &second.payload) else {
            panic!("expected banks");
        };
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            for (u, v) in x.parameters.iter().zip(&y.parameters) {
                approx::assert_abs_diff_eq!(*u, *v, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_corrupted_magic_is_format_fault() {
        let mut bytes = flat_bank(1, 2).encode();
        bytes[0] = b'X';
        assert!(matches!(
            PresetBinary::decode(&bytes, OWNER),
            Err(SymbiosisError::Format(_))
        ));
    }

    #[test]
    fn test_wrong_owner_and_version_are_format_faults() {
        let bytes = flat_bank(1, 2).encode();
        assert!(matches!(
            PresetBinary::decode(&bytes, OWNER + 1),
            Err(SymbiosisError::Format(_))
        ));

        let mut bytes = bytes;
        bytes[15] = 2;
        assert!(matches!(
            PresetBinary::decode(&bytes, OWNER),
            Err(SymbiosisError::Format(_))
        ));
    }

    #[test]
    fn test_declared_size_beyond_data_is_format_fault() {
        let mut bytes = flat_bank(1, 2).encode();
        bytes.truncate(bytes.len() - 4);
        assert!(matches!(
            PresetBinary::decode(&bytes, OWNER),
            Err(SymbiosisError::Format(_))
        ));
    }

    #[test]
    fn test_truncated_payload_is_bounds_fault() {
        let preset = PresetBinary {
            owner_id: OWNER,
            owner_version: 1,
            payload: PresetPayload::ProgramChunk {
                parameter_count: 0,
                name: "x".into(),
                chunk: vec![9; 8],
            },
        };
        let mut bytes = preset.encode();
        // Lie about the chunk size while keeping the header consistent.
        let at = HEADER_SIZE + 4 + NAME_FIELD_SIZE;
        bytes[at..at + 4].copy_from_slice(&64u32.to_be_bytes());
        assert!(matches!(
            PresetBinary::decode(&bytes, OWNER),
            Err(SymbiosisError::Bounds(_))
        ));
        assert!(matches!(
            PresetBinary::decode(&bytes[..10], OWNER),
            Err(SymbiosisError::Bounds(_))
        ));
    }

    #[test]
    fn test_unknown_tag_is_format_fault() {
        let mut bytes = flat_bank(1, 1).encode();
        bytes[8..12].copy_from_slice(b"Junk");
        assert!(matches!(
            PresetBinary::decode(&bytes, OWNER),
            Err(SymbiosisError::Format(_))
        ));
    }

    #[test]
    fn test_bank_with_more_programs_loads_overlap() {
        let mut plugin = MockPlugin::new(OWNER, 3, 8);
        let bytes = flat_bank(10, 3).encode();
        assert_eq!(load_preset(&mut plugin, &bytes).unwrap(), LoadOutcome::Imperfect);
        assert_eq!(plugin.program_names[7], "Program 7");
        approx::assert_abs_diff_eq!(plugin.programs[7][0], 0.1, epsilon = 1e-6);
        // The selection before the load is restored.
        assert_eq!(plugin.current, 0);
    }

    #[test]
    fn test_bank_declaring_more_programs_than_present_loads_overlap() {
        let mut plugin = MockPlugin::new(OWNER, 2, 8);
        let mut bytes = flat_bank(8, 2).encode();
        // Claim ten programs while only eight blocks follow.
        bytes[24..28].copy_from_slice(&10u32.to_be_bytes());
        assert_eq!(load_preset(&mut plugin, &bytes).unwrap(), LoadOutcome::Imperfect);
        assert_eq!(plugin.program_names[7], "Program 7");
        approx::assert_abs_diff_eq!(plugin.programs[7][1], 0.5, epsilon = 1e-6);

        // Reading every declared block runs out of data.
        assert!(matches!(
            PresetBinary::decode(&bytes, OWNER),
            Err(SymbiosisError::Bounds(_))
        ));
    }

    #[test]
    fn test_matching_bank_is_perfect() {
        let mut plugin = MockPlugin::new(OWNER, 5, 4);
        let bytes = flat_bank(4, 5).encode();
        assert_eq!(load_preset(&mut plugin, &bytes).unwrap(), LoadOutcome::Perfect);
    }

    #[test]
    fn test_program_with_fewer_parameters_zero_fills() {
        let mut plugin = MockPlugin::new(OWNER, 3, 1);
        plugin.programs[0] = vec![0.9, 0.9, 0.9];
        let preset = PresetBinary {
            owner_id: OWNER,
            owner_version: 1,
            payload: PresetPayload::Program(ProgramBlock {
                name: "Short".into(),
                parameters: vec![0.5],
            }),
        };
        assert_eq!(apply_preset(&mut plugin, &preset), LoadOutcome::Imperfect);
        assert_eq!(plugin.programs[0], vec![0.5, 0.0, 0.0]);
        assert_eq!(plugin.program_names[0], "Short");
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let mut plugin = MockPlugin::new(OWNER, 2, 1);
        let preset = PresetBinary {
            owner_id: OWNER,
            owner_version: 1,
            payload: PresetPayload::Program(ProgramBlock {
                name: "Hot".into(),
                parameters: vec![1.5, -0.25],
            }),
        };
        assert_eq!(apply_preset(&mut plugin, &preset), LoadOutcome::Imperfect);
        assert_eq!(plugin.programs[0], vec![1.0, 0.0]);
    }

    #[test]
    fn test_capture_bank_restores_program() {
        let mut plugin = MockPlugin::new(OWNER, 2, 3);
        plugin.current = 2;
        plugin.programs[1] = vec![0.2, 0.4];
        let preset = capture_bank(&mut plugin).unwrap();
        assert_eq!(plugin.current, 2);
        let PresetPayload::Bank(programs) = &preset.payload else {
            panic!("expected flat bank");
        };
        assert_eq!(programs.len(), 3);
        assert_eq!(programs[1].parameters, vec![0.2, 0.4]);
        assert_eq!(preset.owner_id, OWNER);
    }

    #[test]
    fn test_chunk_program_round_trip_through_plugin() {
        let mut plugin = MockPlugin::new(OWNER, 2, 1);
        plugin.flags.program_chunks = true;
        plugin.chunk_data = vec![7, 7, 7];
        let bytes = create_program_preset(&mut plugin).unwrap();
        assert_eq!(bytes.len(), 60 + 3);

        plugin.chunk_data.clear();
        assert_eq!(load_preset(&mut plugin, &bytes).unwrap(), LoadOutcome::Perfect);
        assert_eq!(plugin.chunk_data, vec![7, 7, 7]);
    }

    #[test]
    fn test_chunk_program_restores_its_name() {
        let mut plugin = MockPlugin::new(OWNER, 2, 4);
        plugin.flags.program_chunks = true;
        let preset = PresetBinary {
            owner_id: OWNER,
            owner_version: 1,
            payload: PresetPayload::ProgramChunk {
                parameter_count: 2,
                name: "Saved Name".into(),
                chunk: vec![1, 2],
            },
        };
        assert_eq!(load_preset(&mut plugin, &preset.encode()).unwrap(), LoadOutcome::Perfect);
        assert_eq!(plugin.program_names[0], "Saved Name");
        assert_eq!(plugin.chunk_data, vec![1, 2]);
    }

    #[test]
    fn test_empty_chunk_is_refused() {
        let mut plugin = MockPlugin::new(OWNER, 2, 1);
        plugin.flags.program_chunks = true;
        assert!(matches!(
            create_bank_preset(&mut plugin),
            Err(SymbiosisError::Foreign(_))
        ));
    }

    #[test]
    fn test_long_names_keep_terminator() {
        let preset = PresetBinary {
            owner_id: OWNER,
            owner_version: 1,
            payload: PresetPayload::Program(ProgramBlock {
                name: "x".repeat(40),
                parameters: vec![],
            }),
        };
        let decoded = PresetBinary::decode(&preset.encode(), OWNER).unwrap();
        let PresetPayload::Program(block) = decoded.payload else {
            panic!("expected program");
        };
        assert_eq!(block.name.len(), NAME_FIELD_SIZE - 1);
    }

    #[test]
    fn test_long_names_are_cut_between_characters() {
        // 13 two-byte characters; the 14th would straddle the terminator.
        let name = "é".repeat(20);
        let preset = PresetBinary {
            owner_id: OWNER,
            owner_version: 1,
            payload: PresetPayload::Program(ProgramBlock {
                name,
                parameters: vec![],
            }),
        };
        let bytes = preset.encode();
        let field = &bytes[HEADER_SIZE + 4..HEADER_SIZE + 4 + NAME_FIELD_SIZE];
        let end = field.iter().position(|b| *b == 0).unwrap();
        assert_eq!(std::str::from_utf8(&field[..end]).unwrap(), "é".repeat(13));
    }
}
