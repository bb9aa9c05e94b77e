//! In-code fixture builders shared by the integration tests

#![allow(dead_code)]

use sekai_asset_cri::utf::{TypeTag, UtfTableBuilder, Value};

/// AFS2 archive with 2-byte cue ids and 4-byte offsets; every blob starts aligned
pub fn build_afs2(entries: &[(u16, &[u8])], alignment: u32) -> Vec<u8> {
    let count = entries.len();
    let align = alignment.max(1) as usize;
    let table_end = 0x10 + count * 2 + (count + 1) * 4;

    let mut starts = Vec::with_capacity(count);
    let mut cursor = table_end;
    for (_, blob) in entries {
        let start = cursor.div_ceil(align) * align;
        starts.push(start);
        cursor = start + blob.len();
    }

    let mut out = Vec::with_capacity(cursor);
    out.extend_from_slice(b"AFS2");
    out.extend_from_slice(&[1, 4, 2, 0]);
    out.extend_from_slice(&(count as u32).to_le_bytes());
    out.extend_from_slice(&alignment.to_le_bytes());
    for (cue_id, _) in entries {
        out.extend_from_slice(&cue_id.to_le_bytes());
    }
    out.extend_from_slice(&(table_end as u32).to_le_bytes());
    for (start, (_, blob)) in starts.iter().zip(entries) {
        out.extend_from_slice(&((start + blob.len()) as u32).to_le_bytes());
    }
    for (start, (_, blob)) in starts.iter().zip(entries) {
        out.resize(*start, 0);
        out.extend_from_slice(blob);
    }
    out
}

/// `0x07D0` command referencing a synth row
pub fn waveform_command(synth: u16) -> Vec<u8> {
    let [hi, lo] = synth.to_be_bytes();
    vec![0x07, 0xD0, 0x04, 0x00, 0x02, hi, lo]
}

/// Synth `ReferenceItems` pointing at a waveform row
pub fn synth_items(waveform: u16) -> Vec<u8> {
    let [hi, lo] = waveform.to_be_bytes();
    vec![0x00, 0x01, hi, lo]
}

#[derive(Debug, Clone)]
pub struct WaveformRow {
    pub encode_type: u64,
    pub streaming: bool,
    pub awb_id: u64,
    pub port: u64,
}

impl WaveformRow {
    pub fn memory(encode_type: u64, awb_id: u64) -> Self {
        Self {
            encode_type,
            streaming: false,
            awb_id,
            port: 0,
        }
    }

    pub fn streamed(encode_type: u64, awb_id: u64, port: u64) -> Self {
        Self {
            encode_type,
            streaming: true,
            awb_id,
            port,
        }
    }
}

/// Minimal ACB header table
#[derive(Debug, Clone, Default)]
pub struct AcbFixture {
    /// `(ReferenceType, ReferenceIndex)`
    pub cues: Vec<(u64, u64)>,
    /// `(CueName, CueIndex)`
    pub cue_names: Vec<(String, u64)>,
    pub waveforms: Vec<WaveformRow>,
    pub synths: Vec<Vec<u8>>,
    /// `EventIndex` per track
    pub tracks: Vec<u64>,
    pub commands: Vec<Vec<u8>>,
    /// `None` keeps the header without a SequenceTable
    pub sequences: Option<Vec<Vec<u16>>>,
    pub awb: Vec<u8>,
    pub stream_awbs: Vec<String>,
}

impl AcbFixture {
    /// One cue, one track, one waveform in the embedded archive
    pub fn single(name: &str, encode_type: u64, awb_id: u16, blob: &[u8]) -> Self {
        Self {
            cues: vec![(3, 0)],
            cue_names: vec![(name.to_string(), 0)],
            waveforms: vec![WaveformRow::memory(encode_type, awb_id as u64)],
            synths: vec![synth_items(0)],
            tracks: vec![0],
            commands: vec![waveform_command(0)],
            sequences: None,
            awb: build_afs2(&[(awb_id, blob)], 32),
            stream_awbs: Vec::new(),
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut cues = UtfTableBuilder::new("Cue")
            .column("ReferenceType", TypeTag::U8)
            .column("ReferenceIndex", TypeTag::U16);
        for (kind, index) in &self.cues {
            cues = cues.row(vec![Value::UInt(*kind), Value::UInt(*index)]);
        }

        let mut names = UtfTableBuilder::new("CueName")
            .column("CueName", TypeTag::String)
            .column("CueIndex", TypeTag::U16);
        for (name, index) in &self.cue_names {
            names = names.row(vec![Value::string(name.as_str()), Value::UInt(*index)]);
        }

        let mut waveforms = UtfTableBuilder::new("Waveform")
            .column("EncodeType", TypeTag::U8)
            .column("Streaming", TypeTag::U8)
            .column("MemoryAwbId", TypeTag::U16)
            .column("StreamAwbId", TypeTag::U16)
            .column("StreamAwbPortNo", TypeTag::U16);
        for w in &self.waveforms {
            let (memory_id, stream_id, port) = if w.streaming {
                (0xFFFF, w.awb_id, w.port)
            } else {
                (w.awb_id, 0xFFFF, 0xFFFF)
            };
            waveforms = waveforms.row(vec![
                Value::UInt(w.encode_type),
                Value::UInt(w.streaming as u64),
                Value::UInt(memory_id),
                Value::UInt(stream_id),
                Value::UInt(port),
            ]);
        }

        let mut synths = UtfTableBuilder::new("Synth").column("ReferenceItems", TypeTag::Data);
        for items in &self.synths {
            synths = synths.row(vec![Value::data(items.clone())]);
        }

        let mut tracks = UtfTableBuilder::new("Track").column("EventIndex", TypeTag::U16);
        for event in &self.tracks {
            tracks = tracks.row(vec![Value::UInt(*event)]);
        }

        let mut events = UtfTableBuilder::new("TrackEvent").column("Command", TypeTag::Data);
        for command in &self.commands {
            events = events.row(vec![Value::data(command.clone())]);
        }

        let mut header = UtfTableBuilder::new("Header")
            .column("CueTable", TypeTag::Data)
            .column("CueNameTable", TypeTag::Data)
            .column("WaveformTable", TypeTag::Data)
            .column("SynthTable", TypeTag::Data)
            .column("TrackTable", TypeTag::Data)
            .column("TrackEventTable", TypeTag::Data)
            .column("AwbFile", TypeTag::Data);
        let mut row = vec![
            Value::data(cues.build().unwrap()),
            Value::data(names.build().unwrap()),
            Value::data(waveforms.build().unwrap()),
            Value::data(synths.build().unwrap()),
            Value::data(tracks.build().unwrap()),
            Value::data(events.build().unwrap()),
            Value::data(self.awb.clone()),
        ];

        if let Some(sequences) = &self.sequences {
            let mut table = UtfTableBuilder::new("Sequence")
                .column("NumTracks", TypeTag::U16)
                .column("TrackIndex", TypeTag::Data);
            for indices in sequences {
                let bytes: Vec<u8> = indices.iter().flat_map(|i| i.to_be_bytes()).collect();
                table = table.row(vec![Value::UInt(indices.len() as u64), Value::data(bytes)]);
            }
            header = header.column("SequenceTable", TypeTag::Data);
            row.push(Value::data(table.build().unwrap()));
        }

        if !self.stream_awbs.is_empty() {
            let mut table = UtfTableBuilder::new("StreamAwb")
                .column("Name", TypeTag::String)
                .column("Hash", TypeTag::Data);
            for name in &self.stream_awbs {
                table = table.row(vec![Value::string(name.as_str()), Value::data(vec![0u8; 16])]);
            }
            header = header.column("StreamAwbHash", TypeTag::Data);
            row.push(Value::data(table.build().unwrap()));
        }

        header.row(row).build().unwrap()
    }
}

/// One USM block or data chunk: 0x18-byte chunk header, payload at +0x20
pub fn usm_chunk(signature: &[u8; 4], data_type: u8, payload: &[u8], footer: usize) -> Vec<u8> {
    let size = 0x18 + payload.len() + footer;
    let mut out = Vec::with_capacity(8 + size);
    out.extend_from_slice(signature);
    out.extend_from_slice(&(size as u32).to_be_bytes());
    out.extend_from_slice(&0x18u16.to_be_bytes());
    out.extend_from_slice(&(footer as u16).to_be_bytes());
    out.extend_from_slice(&[0, 0, 0, data_type]);
    out.extend_from_slice(&[0u8; 16]);
    out.extend_from_slice(payload);
    out.resize(out.len() + footer, 0);
    out
}

fn marker(text: &str) -> Vec<u8> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.extend_from_slice(b"   ===============\0");
    bytes
}

/// USM container builder
#[derive(Debug, Clone)]
pub struct UsmFixture {
    pub filename: String,
    pub has_audio: bool,
    /// `(signature, data_type, payload)` in container order
    pub chunks: Vec<([u8; 4], u8, Vec<u8>)>,
    pub terminated: bool,
}

impl UsmFixture {
    pub fn new(filename: &str, has_audio: bool) -> Self {
        Self {
            filename: filename.to_string(),
            has_audio,
            chunks: Vec::new(),
            terminated: true,
        }
    }

    pub fn video(mut self, data_type: u8, payload: Vec<u8>) -> Self {
        self.chunks.push((*b"@SFV", data_type, payload));
        self
    }

    pub fn audio(mut self, data_type: u8, payload: Vec<u8>) -> Self {
        self.chunks.push((*b"@SFA", data_type, payload));
        self
    }

    pub fn unterminated(mut self) -> Self {
        self.terminated = false;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let crid = UtfTableBuilder::new("CRIUSF_DIR_STREAM")
            .column("fmtver", TypeTag::U32)
            .column("filename", TypeTag::String)
            .column("filesize", TypeTag::U32)
            .row(vec![Value::UInt(1), Value::string("container.usm"), Value::UInt(0)])
            .row(vec![Value::UInt(1), Value::string(self.filename.as_str()), Value::UInt(0)])
            .build()
            .unwrap();
        let video_info = UtfTableBuilder::new("VIDEO_HDRINFO")
            .column("width", TypeTag::U32)
            .column("height", TypeTag::U32)
            .row(vec![Value::UInt(1920), Value::UInt(1080)])
            .build()
            .unwrap();
        let audio_info = UtfTableBuilder::new("AUDIO_HDRINFO")
            .column("sampling_rate", TypeTag::U32)
            .row(vec![Value::UInt(48000)])
            .build()
            .unwrap();
        let seek_info = UtfTableBuilder::new("VIDEO_SEEKINFO")
            .column("ofs_byte", TypeTag::U64)
            .row(vec![Value::UInt(0)])
            .build()
            .unwrap();

        let mut out = usm_chunk(b"CRID", 1, &crid, 0);
        out.extend(usm_chunk(b"@SFV", 1, &video_info, 0));
        if self.has_audio {
            out.extend(usm_chunk(b"@SFA", 1, &audio_info, 0));
        }
        out.extend(usm_chunk(b"@SFV", 2, &marker("#HEADER END"), 0));
        if self.has_audio {
            out.extend(usm_chunk(b"@SFA", 2, &marker("#HEADER END"), 0));
        }
        out.extend(usm_chunk(b"@SFV", 3, &seek_info, 0));
        out.extend(usm_chunk(b"@SFV", 2, &marker("#METADATA END"), 0));

        for (signature, data_type, payload) in &self.chunks {
            out.extend(usm_chunk(signature, *data_type, payload, 4));
        }
        if self.terminated {
            out.extend(usm_chunk(b"@SFV", 2, &marker("#CONTENTS END"), 0));
        }
        out
    }
}
