// src/utils/streams.rs
use anyhow::{anyhow, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;


/// Collects every line from an async reader, without terminators.
pub async fn read_lines_to_vec<R: AsyncRead + Unpin>(reader: R) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    let mut reader = BufReader::new(reader).lines();
    while let Some(line) = reader.next_line().await? {
        lines.push(line);
    }
    Ok(lines)
}

/// Drains a child's stdout and stderr concurrently, then waits for it to exit.
///
/// # Arguments
///
/// * `child` - Spawned process with stdout and stderr piped.
///
/// # Returns
/// Tuple: (stdout lines, stderr lines).
///
pub async fn read_child_output_to_vec(child: &mut Child) -> Result<(Vec<String>, Vec<String>)> {
    let stdout = child.stdout.take().ok_or_else(|| anyhow!("Child stdout was not piped"))?;
    let stderr = child.stderr.take().ok_or_else(|| anyhow!("Child stderr was not piped"))?;
    let (out_lines, err_lines) = tokio::try_join!(read_lines_to_vec(stdout), read_lines_to_vec(stderr))?;
    child.wait().await?;
    Ok((out_lines, err_lines))
}

/// Splits captured process output into lines, dropping empty ones.
pub fn output_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
