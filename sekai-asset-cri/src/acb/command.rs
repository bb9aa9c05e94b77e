//! Track command bytecode
//!
//! A command blob is a run of `(u16 opcode, u8 length, params)` records,
//! big-endian, ending at opcode 0 or at the end of the blob.

use sekai_asset_core::{AssetError, BinaryReader, ByteOrder, Result};

pub const OP_END: u16 = 0x0000;
pub const OP_SET_WAVEFORM: u16 = 0x07D0;
pub const OP_SET_START_OFFSET: u16 = 0x07D1;

/// Reference kind expected in the params of [`OP_SET_WAVEFORM`]
pub const SYNTH_REFERENCE: u16 = 2;

/// A decoded command record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// Play the waveform referenced by a Synth row
    SetWaveform { synth_index: u16 },
    /// Start offset in milliseconds; not needed for extraction
    SetStartOffset(u32),
    Other { opcode: u16, params: &'a [u8] },
}

/// Iterator over the records of one command blob
#[derive(Debug, Clone)]
pub struct CommandIter<'a> {
    reader: BinaryReader<'a>,
    done: bool,
}

impl<'a> CommandIter<'a> {
    pub fn new(blob: &'a [u8]) -> Self {
        Self {
            reader: BinaryReader::new(blob, ByteOrder::Big),
            done: false,
        }
    }

    fn next_record(&mut self) -> Result<Option<Command<'a>>> {
        if self.reader.remaining() == 0 {
            return Ok(None);
        }
        let opcode = self.reader.read_u16()?;
        let len = self.reader.read_u8()? as usize;
        let params = self.reader.read_slice(len)?;

        Ok(match opcode {
            OP_END => None,
            OP_SET_WAVEFORM => {
                let mut params_reader = BinaryReader::new(params, ByteOrder::Big);
                let kind = params_reader.read_u16()?;
                if kind != SYNTH_REFERENCE {
                    return Err(AssetError::unsupported(format!(
                        "waveform command reference kind {}",
                        kind
                    )));
                }
                Some(Command::SetWaveform {
                    synth_index: params_reader.read_u16()?,
                })
            }
            OP_SET_START_OFFSET => {
                let mut params_reader = BinaryReader::new(params, ByteOrder::Big);
                Some(Command::SetStartOffset(params_reader.read_u32()?))
            }
            opcode => Some(Command::Other { opcode, params }),
        })
    }
}

impl<'a> Iterator for CommandIter<'a> {
    type Item = Result<Command<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(command)) => Some(Ok(command)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
