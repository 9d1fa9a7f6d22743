//! Line-oriented JSON request loop over stdin/stdout.
//!
//! Each input line is one request, each output line one [`Envelope`]:
//!
//! | request | response |
//! |---|---|
//! | `{"sequence": ">id\nACGT..."}` | `{"status":200,"body":{...}}` |
//! | `{"method": "health"}` | `{"status":200,"body":{"status":"healthy"}}` |
//! | unparsable line | `{"status":400,"detail":"..."}` |
//!
//! Blank lines are skipped; EOF ends the loop.

use std::io::{BufRead, Write};

use serde::Deserialize;

use crate::pipeline::Designer;
use crate::report::{DesignResponse, Envelope, HEALTHY};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Request {
    Design { sequence: String },
    Method { method: String },
}

/// Serve requests from stdin until EOF.
pub fn run_stdio_server(designer: &Designer) -> std::io::Result<()> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    run_server_loop(designer, &mut stdin.lock(), &mut stdout.lock())
}

/// Serve requests from `reader`, answering on `writer`, until the reader is
/// exhausted. Only IO errors on the streams end the loop early.
pub fn run_server_loop<R: BufRead, W: Write>(
    designer: &Designer,
    reader: &mut R,
    writer: &mut W,
) -> std::io::Result<()> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let reply = handle_line(designer, trimmed);
        writer.write_all(reply.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
}

fn encode<B: serde::Serialize>(env: Envelope<B>) -> String {
    serde_json::to_string(&env).unwrap_or_else(|e| {
        log::error!("cannot encode response: {e}");
        r#"{"status":500,"detail":"response encoding failed"}"#.to_string()
    })
}

/// Answer one request line.
pub fn handle_line(designer: &Designer, line: &str) -> String {
    match serde_json::from_str::<Request>(line) {
        Ok(Request::Design { sequence }) => match designer.design(&sequence) {
            Ok(result) => encode(Envelope::ok(DesignResponse::from(&result))),
            Err(e) => {
                if e.is_client_error() {
                    log::warn!("rejected request: {e}");
                } else {
                    log::error!("request failed: {e}");
                }
                encode::<()>((&e).into())
            }
        },
        Ok(Request::Method { method }) if method == "health" => encode(Envelope::ok(HEALTHY)),
        Ok(Request::Method { method }) => encode::<()>(Envelope::error(400, format!("unknown method: {method}"))),
        Err(e) => {
            log::warn!("malformed request line: {e}");
            encode::<()>(Envelope::error(400, format!("malformed request: {e}")))
        }
    }
}
