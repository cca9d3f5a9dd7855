use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};

pub const STOP_PROMPT: &str = " Do you want to stop the program? [y/n]: ";

/// Source of the operator's answer to the stop prompt
#[async_trait]
pub trait Confirm: Send {
    /// Ask once. `Ok(true)` means stop.
    async fn confirm(&mut self) -> std::io::Result<bool>;
}

/// An answer is affirmative when its first character is `y`
pub fn parse_answer(line: &str) -> bool {
    line.starts_with('y')
}

/// Prompts on a writer and reads one line from a reader
pub struct ConsolePrompt<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> ConsolePrompt<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl ConsolePrompt<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

#[async_trait]
impl<R, W> Confirm for ConsolePrompt<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn confirm(&mut self) -> std::io::Result<bool> {
        self.writer.write_all(STOP_PROMPT.as_bytes()).await?;
        self.writer.flush().await?;

        let mut line = String::new();
        let read = self.reader.read_line(&mut line).await?;
        if read == 0 {
            // EOF: nobody can answer, keep running
            return Ok(false);
        }
        Ok(parse_answer(&line))
    }
}
