use std::fs::File;
use std::path::Path;

use bytes::Bytes;
use pcap_parser::{
    Block, LegacyPcapReader, Linktype, PcapBlockOwned, PcapError, PcapNGReader,
    traits::PcapReaderIterator,
};
use tracing::{debug, trace};

use crate::source::{PacketEvent, PacketSource, SourceError};

use super::error::{CaptureFormat, PcapSourceError};
use super::layout;
use super::reader::{
    Interface, captured, interface_for, is_pcapng_magic, legacy_ts_to_seconds,
    pcapng_ts_to_seconds, read_magic_and_rewind, ts_units_per_second,
};

pub struct PcapFileSource {
    inner: PcapReader,
}

enum PcapReader {
    Legacy {
        reader: LegacyPcapReader<File>,
        linktype: Option<Linktype>,
        nanosecond: bool,
    },
    Ng {
        reader: PcapNGReader<File>,
        interfaces: Vec<Interface>,
    },
}

impl PcapFileSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path).map_err(SourceError::from)?;
        let inner = create_reader(file).map_err(SourceError::from)?;
        debug!(path = %path.display(), "opened capture");
        Ok(Self { inner })
    }
}

impl PacketSource for PcapFileSource {
    fn next_packet(&mut self) -> Result<Option<PacketEvent>, SourceError> {
        next_packet(&mut self.inner).map_err(SourceError::from)
    }
}

fn create_reader(file: File) -> Result<PcapReader, PcapSourceError> {
    let mut file = file;
    let magic = read_magic_and_rewind(&mut file)?;

    if is_pcapng_magic(&magic) {
        let reader = PcapNGReader::new(layout::PCAP_READER_BUFFER_SIZE, file)
            .map_err(|e| pcap_error(CaptureFormat::PcapNg, "reader init", e.to_string()))?;
        Ok(PcapReader::Ng {
            reader,
            interfaces: Vec::new(),
        })
    } else {
        let reader = LegacyPcapReader::new(layout::PCAP_READER_BUFFER_SIZE, file)
            .map_err(|e| pcap_error(CaptureFormat::Legacy, "reader init", e.to_string()))?;
        Ok(PcapReader::Legacy {
            reader,
            linktype: None,
            nanosecond: false,
        })
    }
}

fn pcap_error(format: CaptureFormat, stage: &'static str, message: String) -> PcapSourceError {
    PcapSourceError::Parse {
        format,
        stage,
        message,
    }
}

fn next_packet(reader: &mut PcapReader) -> Result<Option<PacketEvent>, PcapSourceError> {
    loop {
        match reader {
            PcapReader::Legacy {
                reader,
                linktype,
                nanosecond,
            } => match reader.next() {
                Ok((offset, block)) => {
                    let event = match block {
                        PcapBlockOwned::LegacyHeader(header) => {
                            *linktype = Some(header.network);
                            *nanosecond = header.is_nanosecond_precision();
                            trace!(linktype = header.network.0, "pcap header");
                            None
                        }
                        PcapBlockOwned::Legacy(packet) => Some(PacketEvent {
                            ts: Some(legacy_ts_to_seconds(
                                packet.ts_sec,
                                packet.ts_usec,
                                *nanosecond,
                            )),
                            linktype: linktype.unwrap_or(Linktype::ETHERNET),
                            data: Bytes::copy_from_slice(captured(packet.data, packet.caplen)),
                        }),
                        _ => None,
                    };
                    reader.consume(offset);
                    if event.is_some() {
                        return Ok(event);
                    }
                }
                Err(PcapError::Eof) => return Ok(None),
                Err(PcapError::Incomplete(_)) => {
                    reader
                        .refill()
                        .map_err(|e| pcap_error(CaptureFormat::Legacy, "refill", e.to_string()))?;
                }
                Err(e) => return Err(pcap_error(CaptureFormat::Legacy, "block read", e.to_string())),
            },
            PcapReader::Ng { reader, interfaces } => match reader.next() {
                Ok((offset, block)) => {
                    let event = match block {
                        PcapBlockOwned::NG(Block::SectionHeader(_)) => {
                            // Interface ids restart in every section.
                            interfaces.clear();
                            None
                        }
                        PcapBlockOwned::NG(Block::InterfaceDescription(intf)) => {
                            trace!(
                                linktype = intf.linktype.0,
                                tsresol = intf.if_tsresol,
                                "pcapng interface"
                            );
                            interfaces.push(Interface {
                                linktype: intf.linktype,
                                ts_units: ts_units_per_second(intf.if_tsresol),
                            });
                            None
                        }
                        PcapBlockOwned::NG(Block::EnhancedPacket(packet)) => {
                            let interface = interface_for(interfaces, packet.if_id);
                            Some(PacketEvent {
                                ts: Some(pcapng_ts_to_seconds(
                                    packet.ts_high,
                                    packet.ts_low,
                                    interface.ts_units,
                                )),
                                linktype: interface.linktype,
                                data: Bytes::copy_from_slice(captured(packet.data, packet.caplen)),
                            })
                        }
                        PcapBlockOwned::NG(Block::SimplePacket(packet)) => {
                            let interface = interface_for(interfaces, 0);
                            Some(PacketEvent {
                                ts: None,
                                linktype: interface.linktype,
                                data: Bytes::copy_from_slice(packet.data),
                            })
                        }
                        _ => None,
                    };
                    reader.consume(offset);
                    if event.is_some() {
                        return Ok(event);
                    }
                }
                Err(PcapError::Eof) => return Ok(None),
                Err(PcapError::Incomplete(_)) => {
                    reader
                        .refill()
                        .map_err(|e| pcap_error(CaptureFormat::PcapNg, "refill", e.to_string()))?;
                }
                Err(e) => return Err(pcap_error(CaptureFormat::PcapNg, "block read", e.to_string())),
            },
        }
    }
}
