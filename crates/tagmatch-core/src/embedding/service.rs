//! Pipelined client for the remote contextual-embedding service.
//!
//! The client speaks the two-stream session protocol: requests go out
//! on the command stream, responses come back on the result stream, and
//! a textual configuration handshake at connect time establishes the
//! server's sequence length and pooling mode (per-token vectors are
//! required; a pooled server is rejected at startup).
//!
//! Each session pipelines: `submit_batch` only serializes and queues a
//! request, while a dedicated receiver worker drains responses
//! concurrently and writes unit-normalized rows straight into the
//! destination matrix it owns for the duration of the session.
//! `end_session` is the single join point. Network round-trip latency
//! therefore overlaps with request preparation on the calling thread.
//!
//! Failure semantics: protocol violations (bad dtype, shape mismatch,
//! unknown request id) are fatal and unrecoverable; the service
//! contract is trusted and nothing here retries. No socket timeouts are
//! set, so a hung server blocks `end_session` indefinitely.

use super::matrix::{l2_normalize, EmbeddingMatrix};
use super::provider::EmbeddingProvider;
use super::wire::{parse_decimal, write_frame, FrameBuf, ResponseHeader, ServerConfig};
use crate::config::{DEFAULT_MAX_PART_BYTES, SPECIAL_TOKEN_POSITIONS};
use crate::error::{EmbeddingError, ProtocolError};
use crate::progress::ProgressFn;
use std::net::TcpStream;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Addresses of the server's command (outbound) and result (inbound)
/// streams.
#[derive(Clone, Debug)]
pub struct ServiceEndpoints {
    /// Where requests are sent.
    pub command: String,
    /// Where responses are received.
    pub result: String,
}

/// Destination bookkeeping for one outstanding request.
///
/// Created when a batch is sent, consumed exactly once when its
/// correlated response arrives, never retried. The slot index is
/// `request_id - session_offset`, so the in-flight table is a
/// preallocated array addressed directly rather than a hash map.
struct InFlight {
    slot: usize,
    sentence_lens: Vec<usize>,
    row_offset: usize,
}

/// State of one embedding session.
#[derive(Debug)]
struct Session {
    offset: u64,
    expected: usize,
    submitted: usize,
    dest_rows: usize,
    reg_tx: mpsc::Sender<InFlight>,
    worker: JoinHandle<Result<EmbeddingMatrix, ProtocolError>>,
}

/// Client for the remote embedding service.
///
/// All connection state (streams, request counter, session) lives on
/// this struct, so independent clients can coexist in one process.
/// One client serves one session at a time; two corpora sharing a
/// client must embed sequentially.
#[derive(Debug)]
pub struct ServiceClient {
    identity: Vec<u8>,
    command: TcpStream,
    result: TcpStream,
    server: ServerConfig,
    next_request_id: u64,
    send_buf: Vec<u8>,
    max_part_bytes: usize,
    session: Option<Session>,
}

impl ServiceClient {
    /// Connects both streams and performs the configuration handshake.
    ///
    /// Fails fast if the server cannot be reached, the configuration
    /// blob is malformed, or the server returns pooled vectors.
    pub fn connect(endpoints: &ServiceEndpoints) -> Result<Self, EmbeddingError> {
        Self::connect_with_limit(endpoints, DEFAULT_MAX_PART_BYTES)
    }

    /// Like [`connect`](Self::connect) with an explicit inbound frame
    /// part budget.
    pub fn connect_with_limit(
        endpoints: &ServiceEndpoints,
        max_part_bytes: usize,
    ) -> Result<Self, EmbeddingError> {
        let mut command = TcpStream::connect(&endpoints.command).map_err(ProtocolError::Io)?;
        let mut result = TcpStream::connect(&endpoints.result).map_err(ProtocolError::Io)?;
        command.set_nodelay(true).map_err(ProtocolError::Io)?;

        let identity = session_identity();
        let mut send_buf = Vec::new();

        // Handshake: describe-configuration command, JSON blob reply.
        let request_id: u64 = 0;
        write_frame(
            &mut command,
            &mut send_buf,
            &[&identity, b"SHOW_CONFIG", request_id.to_string().as_bytes()],
        )?;
        let mut frame = FrameBuf::new(max_part_bytes);
        frame.read_from(&mut result)?;
        if frame.part_count() != 3 {
            return Err(ProtocolError::MalformedFrame(format!(
                "handshake reply has {} parts, expected 3",
                frame.part_count()
            ))
            .into());
        }
        if frame.part(0) != identity.as_slice() {
            return Err(ProtocolError::IdentityMismatch.into());
        }
        let server = ServerConfig::parse(frame.part(1))?;
        let echoed = parse_decimal(frame.part(2))?;
        if echoed != request_id {
            return Err(ProtocolError::UnknownRequest(echoed).into());
        }

        info!(
            dim = server.dim,
            max_seq_len = ?server.max_seq_len,
            "connected to embedding service"
        );

        Ok(Self {
            identity,
            command,
            result,
            server,
            next_request_id: request_id + 1,
            send_buf,
            max_part_bytes,
            session: None,
        })
    }

    /// The server-reported configuration.
    pub fn server_config(&self) -> &ServerConfig {
        &self.server
    }
}

impl EmbeddingProvider for ServiceClient {
    fn embedding_dim(&self) -> usize {
        self.server.dim
    }

    fn begin_session(
        &mut self,
        destination: EmbeddingMatrix,
        expected_batches: usize,
        progress: ProgressFn,
    ) -> Result<(), EmbeddingError> {
        if self.session.is_some() {
            return Err(EmbeddingError::SessionActive);
        }

        let offset = self.next_request_id;
        let dest_rows = destination.rows();
        let (reg_tx, reg_rx) = mpsc::channel::<InFlight>();

        let stream = self.result.try_clone().map_err(ProtocolError::Io)?;
        let identity = self.identity.clone();
        let max_seq_len = self.server.max_seq_len;
        let max_part_bytes = self.max_part_bytes;

        let worker = thread::Builder::new()
            .name("embed-recv".to_string())
            .spawn(move || {
                receive_loop(
                    stream,
                    identity,
                    destination,
                    expected_batches,
                    offset,
                    max_seq_len,
                    reg_rx,
                    progress,
                    max_part_bytes,
                )
            })
            .map_err(ProtocolError::Io)?;

        debug!(
            expected_batches,
            request_offset = offset,
            "embedding session started"
        );

        self.session = Some(Session {
            offset,
            expected: expected_batches,
            submitted: 0,
            dest_rows,
            reg_tx,
            worker,
        });
        Ok(())
    }

    fn submit_batch(
        &mut self,
        sentences: &[Vec<&str>],
        row_offset: usize,
    ) -> Result<(), EmbeddingError> {
        let session = self.session.as_mut().ok_or(EmbeddingError::NoSession)?;
        if session.submitted >= session.expected {
            return Err(EmbeddingError::ExcessBatch {
                expected: session.expected,
            });
        }

        let sentence_lens: Vec<usize> = sentences.iter().map(Vec::len).collect();
        let rows: usize = sentence_lens.iter().sum();
        if row_offset + rows > session.dest_rows {
            return Err(EmbeddingError::DestinationOverflow {
                rows,
                offset: row_offset,
                capacity: session.dest_rows,
            });
        }
        if let Some(limit) = self.server.max_seq_len {
            let token_limit = limit.saturating_sub(SPECIAL_TOKEN_POSITIONS);
            if let Some(&longest) = sentence_lens.iter().find(|&&len| len > token_limit) {
                return Err(EmbeddingError::SentenceTooLong {
                    tokens: longest,
                    limit: token_limit,
                });
            }
        }

        let request_id = self.next_request_id;
        let slot = (request_id - session.offset) as usize;

        // Register the destination before the bytes hit the wire so the
        // receiver can always correlate the response, whatever order
        // responses arrive in.
        session
            .reg_tx
            .send(InFlight {
                slot,
                sentence_lens,
                row_offset,
            })
            .map_err(|_| EmbeddingError::WorkerExited)?;

        let payload = serde_json::to_vec(sentences)
            .map_err(|e| ProtocolError::MalformedFrame(e.to_string()))?;
        write_frame(
            &mut self.command,
            &mut self.send_buf,
            &[
                &self.identity,
                &payload,
                request_id.to_string().as_bytes(),
                sentences.len().to_string().as_bytes(),
            ],
        )?;

        // Post-increment: ids are strictly increasing, never reused
        // within a session.
        self.next_request_id += 1;
        session.submitted += 1;
        Ok(())
    }

    fn end_session(&mut self) -> Result<EmbeddingMatrix, EmbeddingError> {
        let session = self.session.take().ok_or(EmbeddingError::NoSession)?;
        if session.submitted < session.expected && !session.worker.is_finished() {
            // The worker is still waiting for responses that will never
            // be requested; joining it would block forever.
            return Err(EmbeddingError::IncompleteSession {
                submitted: session.submitted,
                expected: session.expected,
            });
        }
        drop(session.reg_tx);
        let matrix = session
            .worker
            .join()
            .map_err(|_| EmbeddingError::WorkerPanicked)??;
        debug!(batches = session.expected, "embedding session complete");
        Ok(matrix)
    }
}

/// Builds a session-unique opaque identity for response routing.
fn session_identity() -> Vec<u8> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    format!("tagmatch-{:08x}-{:08x}", std::process::id(), nanos).into_bytes()
}

/// Receiver worker: applies exactly `expected` responses, then returns
/// the filled matrix.
///
/// Owns the result stream clone, the in-flight slot table, and the
/// destination matrix for the whole session. The frame buffer is
/// reused across responses, so exactly one response occupies inbound
/// memory at a time even when many requests are queued at the
/// transport.
#[allow(clippy::too_many_arguments)]
fn receive_loop(
    mut stream: TcpStream,
    identity: Vec<u8>,
    mut matrix: EmbeddingMatrix,
    expected: usize,
    offset: u64,
    max_seq_len: Option<usize>,
    reg_rx: mpsc::Receiver<InFlight>,
    progress: ProgressFn,
    max_part_bytes: usize,
) -> Result<EmbeddingMatrix, ProtocolError> {
    let mut slots: Vec<Option<InFlight>> = (0..expected).map(|_| None).collect();
    let mut applied = vec![false; expected];
    let mut frame = FrameBuf::new(max_part_bytes);

    for completed in 1..=expected {
        frame.read_from(&mut stream)?;
        if frame.part_count() != 4 {
            return Err(ProtocolError::MalformedFrame(format!(
                "response has {} parts, expected 4",
                frame.part_count()
            )));
        }
        if frame.part(0) != identity.as_slice() {
            return Err(ProtocolError::IdentityMismatch);
        }
        let request_id = parse_decimal(frame.part(3))?;
        let slot = request_id
            .checked_sub(offset)
            .filter(|&s| s < expected as u64)
            .ok_or(ProtocolError::UnknownRequest(request_id))? as usize;
        if applied[slot] {
            return Err(ProtocolError::DuplicateResponse(request_id));
        }

        // Registrations arrive in submission order; block until the one
        // for this slot has been delivered.
        while slots[slot].is_none() {
            match reg_rx.recv() {
                Ok(reg) => {
                    let idx = reg.slot;
                    slots[idx] = Some(reg);
                }
                Err(_) => return Err(ProtocolError::UnknownRequest(request_id)),
            }
        }
        let inflight = slots[slot].take().ok_or(ProtocolError::UnknownRequest(request_id))?;
        applied[slot] = true;

        let header: ResponseHeader = serde_json::from_slice(frame.part(1))
            .map_err(|e| ProtocolError::MalformedFrame(e.to_string()))?;
        apply_response(
            &mut matrix,
            &inflight.sentence_lens,
            inflight.row_offset,
            &header,
            frame.part(2),
            max_seq_len,
        )?;
        progress(completed, expected);
    }

    Ok(matrix)
}

/// Validates one response and copies its per-token rows into the
/// destination, stripping special-token positions and unit-normalizing.
///
/// The expected sequence length is the server's fixed maximum, or the
/// longest sentence in the batch plus the two special-token positions
/// when the server uses no fixed length.
pub(crate) fn apply_response(
    matrix: &mut EmbeddingMatrix,
    sentence_lens: &[usize],
    row_offset: usize,
    header: &ResponseHeader,
    raw: &[u8],
    max_seq_len: Option<usize>,
) -> Result<(), ProtocolError> {
    if header.dtype != "float32" {
        return Err(ProtocolError::DtypeMismatch(header.dtype.clone()));
    }

    let longest = sentence_lens.iter().copied().max().unwrap_or(0);
    let seq_len = max_seq_len.unwrap_or(longest + SPECIAL_TOKEN_POSITIONS);
    let dim = matrix.dim();
    let expected_shape = [sentence_lens.len(), seq_len, dim];
    if header.shape != expected_shape {
        return Err(ProtocolError::ShapeMismatch {
            got: header.shape,
            expected: expected_shape,
        });
    }

    let expected_bytes = sentence_lens.len() * seq_len * dim * 4;
    if raw.len() != expected_bytes {
        return Err(ProtocolError::MalformedFrame(format!(
            "raw buffer is {} bytes, shape requires {expected_bytes}",
            raw.len()
        )));
    }

    let mut dest = row_offset;
    for (s, &len) in sentence_lens.iter().enumerate() {
        for t in 0..len {
            // Skip the leading special-token position; trailing
            // positions past `len` are padding and never read.
            let src = ((s * seq_len) + t + 1) * dim * 4;
            let row = matrix.row_mut(dest);
            for (j, out) in row.iter_mut().enumerate() {
                let at = src + j * 4;
                *out = f32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]]);
            }
            l2_normalize(row);
            dest += 1;
        }
    }
    Ok(())
}
