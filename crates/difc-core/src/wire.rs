//! Fixed-shape wire codec for the monitor's call surface.
//!
//! The five legacy operations keep their command numbers and their tri-state
//! integer encodings bit-for-bit: polarity `1`/`-1`/`0` means
//! positive/negative/no-op, edit `1`/`-1`/`0` means grant/revoke/no-op. A
//! `0` on either axis makes the whole edit a no-op, never "set to false".
//! Raw integers are turned into typed variants here and nowhere else; any
//! value outside `{-1, 0, 1}` is a malformed frame, fail-closed.
//!
//! All integers are little-endian. List lengths are validated against
//! [`MAX_LABEL_TAGS`] before any allocation.

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

use crate::context::ProcessSecurityContext;
use crate::tag::{CapabilityEdit, Pid, Polarity, Tag, Uid};

pub use crate::label::MAX_LABEL_TAGS;

/// Command numbers, unchanged from the legacy ioctl surface.
pub mod opcode {
    /// Query a process's secrecy label.
    pub const GET_PROC_SECLABEL: u8 = 1;
    /// Edit the global capability set.
    pub const ADD_GLOBAL_CAP: u8 = 2;
    /// Install a new process security context.
    pub const INIT_PROC_SEC_CONTEXT: u8 = 3;
    /// Gated label taint.
    pub const ADD_TAG_TO_LABEL: u8 = 4;
    /// Edit a process capability set.
    pub const ADD_PROCESS_CAP: u8 = 5;
    /// Host notification that a process exited.
    pub const PROCESS_EXITED: u8 = 6;
}

/// Response kind discriminants.
const RESPONSE_STATUS: u8 = 0;
const RESPONSE_LABEL: u8 = 1;

/// Codec failures. All of them are terminal for the frame that produced
/// them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum WireError {
    /// The payload ended before the message did.
    #[error("truncated message: needed {needed} more bytes")]
    Truncated {
        /// Bytes missing at the point decoding stopped.
        needed: usize,
    },

    /// A tri-state axis held a value outside `{-1, 0, 1}`.
    #[error("invalid tri-state value {value} for {field}")]
    InvalidTriState {
        /// Which axis was malformed.
        field: &'static str,
        /// The offending raw value.
        value: i32,
    },

    /// Unknown command number.
    #[error("unknown opcode {opcode}")]
    UnknownOpcode {
        /// The raw opcode byte.
        opcode: u8,
    },

    /// A declared list length exceeds [`MAX_LABEL_TAGS`].
    #[error("tag list of {len} entries exceeds maximum {max}")]
    ListTooLong {
        /// Declared length.
        len: usize,
        /// The enforced maximum.
        max: usize,
    },

    /// Bytes remained after a complete message was decoded.
    #[error("{count} trailing bytes after message")]
    TrailingBytes {
        /// How many bytes were left over.
        count: usize,
    },

    /// Unknown status code in a response.
    #[error("unknown status code {code}")]
    UnknownStatus {
        /// The raw status value.
        code: i32,
    },

    /// Unknown response kind discriminant.
    #[error("unknown response kind {kind}")]
    UnknownResponseKind {
        /// The raw kind byte.
        kind: u8,
    },
}

/// One capability edit as carried on the wire, with both tri-state axes
/// already decoded. `polarity == None` (or `edit == None`) makes the whole
/// request a no-op success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityEditRequest {
    /// The tag the edit addresses.
    pub tag: Tag,
    /// Which right, or `None` for the no-op axis value.
    pub polarity: Option<Polarity>,
    /// Grant, revoke, or the explicit no-op.
    pub edit: CapabilityEdit,
}

/// A decoded request frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Query a process's secrecy label.
    GetProcessLabel {
        /// The queried process.
        pid: Pid,
    },
    /// Edit the global capability set.
    AddGlobalCap(CapabilityEditRequest),
    /// Install a new process security context.
    InitProcessSecurityContext(ProcessSecurityContext),
    /// Gated label taint.
    AddTagToLabel {
        /// The target process.
        pid: Pid,
        /// The tag to add.
        tag: Tag,
    },
    /// Edit a process capability set.
    AddProcessCap {
        /// The target process.
        pid: Pid,
        /// The edit to apply.
        edit: CapabilityEditRequest,
    },
    /// Host notification that a process exited.
    ProcessExited {
        /// The exited process.
        pid: Pid,
    },
}

/// Outcome of a status-shaped operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// The operation succeeded (no-ops included).
    Ok,
    /// Context initialization targeted a live pid.
    AlreadyInitialized,
    /// A label edit lacked the requisite capability.
    CapabilityDenied,
    /// The operation required tracked state that does not exist.
    UnknownProcess,
    /// A privileged operation arrived on an unprivileged connection.
    PermissionDenied,
    /// The request frame could not be decoded.
    MalformedRequest,
    /// A label edit would grow the label past [`MAX_LABEL_TAGS`].
    LabelFull,
}

impl StatusCode {
    const fn to_wire(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::AlreadyInitialized => 1,
            Self::CapabilityDenied => 2,
            Self::UnknownProcess => 3,
            Self::PermissionDenied => 4,
            Self::MalformedRequest => 5,
            Self::LabelFull => 6,
        }
    }

    const fn from_wire(code: i32) -> Result<Self, WireError> {
        match code {
            0 => Ok(Self::Ok),
            1 => Ok(Self::AlreadyInitialized),
            2 => Ok(Self::CapabilityDenied),
            3 => Ok(Self::UnknownProcess),
            4 => Ok(Self::PermissionDenied),
            5 => Ok(Self::MalformedRequest),
            6 => Ok(Self::LabelFull),
            _ => Err(WireError::UnknownStatus { code }),
        }
    }
}

/// A decoded response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Status for the mutation-shaped operations.
    Status(StatusCode),
    /// Label contents, length-prefixed, order unspecified.
    Label(Vec<Tag>),
}

fn decode_polarity(value: i32) -> Result<Option<Polarity>, WireError> {
    match value {
        1 => Ok(Some(Polarity::Positive)),
        -1 => Ok(Some(Polarity::Negative)),
        0 => Ok(None),
        _ => Err(WireError::InvalidTriState {
            field: "polarity",
            value,
        }),
    }
}

fn decode_edit(value: i32) -> Result<CapabilityEdit, WireError> {
    match value {
        1 => Ok(CapabilityEdit::Grant),
        -1 => Ok(CapabilityEdit::Revoke),
        0 => Ok(CapabilityEdit::None),
        _ => Err(WireError::InvalidTriState {
            field: "edit",
            value,
        }),
    }
}

const fn encode_polarity(polarity: Option<Polarity>) -> i32 {
    match polarity {
        Some(Polarity::Positive) => 1,
        Some(Polarity::Negative) => -1,
        None => 0,
    }
}

const fn encode_edit(edit: CapabilityEdit) -> i32 {
    match edit {
        CapabilityEdit::Grant => 1,
        CapabilityEdit::Revoke => -1,
        CapabilityEdit::None => 0,
    }
}

fn need(buf: &impl Buf, bytes: usize) -> Result<(), WireError> {
    if buf.remaining() < bytes {
        Err(WireError::Truncated {
            needed: bytes - buf.remaining(),
        })
    } else {
        Ok(())
    }
}

fn get_i32(buf: &mut impl Buf) -> Result<i32, WireError> {
    need(buf, 4)?;
    Ok(buf.get_i32_le())
}

fn get_u32(buf: &mut impl Buf) -> Result<u32, WireError> {
    need(buf, 4)?;
    Ok(buf.get_u32_le())
}

fn get_i64(buf: &mut impl Buf) -> Result<i64, WireError> {
    need(buf, 8)?;
    Ok(buf.get_i64_le())
}

fn get_u8(buf: &mut impl Buf) -> Result<u8, WireError> {
    need(buf, 1)?;
    Ok(buf.get_u8())
}

fn get_len(buf: &mut impl Buf) -> Result<usize, WireError> {
    let len = get_u32(buf)? as usize;
    if len > MAX_LABEL_TAGS {
        return Err(WireError::ListTooLong {
            len,
            max: MAX_LABEL_TAGS,
        });
    }
    Ok(len)
}

fn get_tags(buf: &mut impl Buf, len: usize) -> Result<Vec<Tag>, WireError> {
    // Length was bounds-checked before this allocation.
    let mut tags = Vec::with_capacity(len);
    for _ in 0..len {
        tags.push(Tag(get_i64(buf)?));
    }
    Ok(tags)
}

fn put_tags(buf: &mut BytesMut, tags: &[Tag]) {
    buf.put_u32_le(tags.len() as u32);
    for tag in tags {
        buf.put_i64_le(tag.value());
    }
}

fn finish<T>(value: T, buf: &impl Buf) -> Result<T, WireError> {
    if buf.has_remaining() {
        Err(WireError::TrailingBytes {
            count: buf.remaining(),
        })
    } else {
        Ok(value)
    }
}

impl Request {
    /// Encodes the request, opcode byte first.
    #[must_use]
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        match self {
            Self::GetProcessLabel { pid } => {
                buf.put_u8(opcode::GET_PROC_SECLABEL);
                buf.put_i32_le(pid.0);
            }
            Self::AddGlobalCap(edit) => {
                buf.put_u8(opcode::ADD_GLOBAL_CAP);
                buf.put_i64_le(edit.tag.value());
                buf.put_i32_le(encode_polarity(edit.polarity));
                buf.put_i32_le(encode_edit(edit.edit));
            }
            Self::InitProcessSecurityContext(ctx) => {
                buf.put_u8(opcode::INIT_PROC_SEC_CONTEXT);
                buf.put_i32_le(ctx.pid.0);
                buf.put_u32_le(ctx.uid.0);
                put_tags(&mut buf, &ctx.sec);
                put_tags(&mut buf, &ctx.pos);
                put_tags(&mut buf, &ctx.neg);
            }
            Self::AddTagToLabel { pid, tag } => {
                buf.put_u8(opcode::ADD_TAG_TO_LABEL);
                buf.put_i32_le(pid.0);
                buf.put_i64_le(tag.value());
            }
            Self::AddProcessCap { pid, edit } => {
                buf.put_u8(opcode::ADD_PROCESS_CAP);
                buf.put_i32_le(pid.0);
                buf.put_i64_le(edit.tag.value());
                buf.put_i32_le(encode_polarity(edit.polarity));
                buf.put_i32_le(encode_edit(edit.edit));
            }
            Self::ProcessExited { pid } => {
                buf.put_u8(opcode::PROCESS_EXITED);
                buf.put_i32_le(pid.0);
            }
        }
        buf
    }

    /// Decodes one request from a complete frame payload.
    ///
    /// # Errors
    ///
    /// Any [`WireError`]; the frame must be consumed exactly.
    pub fn decode(mut buf: impl Buf) -> Result<Self, WireError> {
        let buf = &mut buf;
        let op = get_u8(buf)?;
        let request = match op {
            opcode::GET_PROC_SECLABEL => Self::GetProcessLabel {
                pid: Pid(get_i32(buf)?),
            },
            opcode::ADD_GLOBAL_CAP => {
                let tag = Tag(get_i64(buf)?);
                let polarity = decode_polarity(get_i32(buf)?)?;
                let edit = decode_edit(get_i32(buf)?)?;
                Self::AddGlobalCap(CapabilityEditRequest {
                    tag,
                    polarity,
                    edit,
                })
            }
            opcode::INIT_PROC_SEC_CONTEXT => {
                let pid = Pid(get_i32(buf)?);
                let uid = Uid(get_u32(buf)?);
                let sec_len = get_len(buf)?;
                let sec = get_tags(buf, sec_len)?;
                let pos_len = get_len(buf)?;
                let pos = get_tags(buf, pos_len)?;
                let neg_len = get_len(buf)?;
                let neg = get_tags(buf, neg_len)?;
                Self::InitProcessSecurityContext(ProcessSecurityContext {
                    pid,
                    uid,
                    sec,
                    pos,
                    neg,
                })
            }
            opcode::ADD_TAG_TO_LABEL => Self::AddTagToLabel {
                pid: Pid(get_i32(buf)?),
                tag: Tag(get_i64(buf)?),
            },
            opcode::ADD_PROCESS_CAP => {
                let pid = Pid(get_i32(buf)?);
                let tag = Tag(get_i64(buf)?);
                let polarity = decode_polarity(get_i32(buf)?)?;
                let edit = decode_edit(get_i32(buf)?)?;
                Self::AddProcessCap {
                    pid,
                    edit: CapabilityEditRequest {
                        tag,
                        polarity,
                        edit,
                    },
                }
            }
            opcode::PROCESS_EXITED => Self::ProcessExited {
                pid: Pid(get_i32(buf)?),
            },
            other => return Err(WireError::UnknownOpcode { opcode: other }),
        };
        finish(request, buf)
    }
}

impl Response {
    /// Encodes the response, kind byte first.
    #[must_use]
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        match self {
            Self::Status(code) => {
                buf.put_u8(RESPONSE_STATUS);
                buf.put_i32_le(code.to_wire());
            }
            Self::Label(tags) => {
                buf.put_u8(RESPONSE_LABEL);
                put_tags(&mut buf, tags);
            }
        }
        buf
    }

    /// Decodes one response from a complete frame payload.
    ///
    /// # Errors
    ///
    /// Any [`WireError`]; the frame must be consumed exactly.
    pub fn decode(mut buf: impl Buf) -> Result<Self, WireError> {
        let buf = &mut buf;
        let response = match get_u8(buf)? {
            RESPONSE_STATUS => Self::Status(StatusCode::from_wire(get_i32(buf)?)?),
            RESPONSE_LABEL => {
                let len = get_len(buf)?;
                Self::Label(get_tags(buf, len)?)
            }
            kind => return Err(WireError::UnknownResponseKind { kind }),
        };
        finish(response, buf)
    }
}
