use tracing_subscriber::fmt::MakeWriter;

/// A writer that redacts provider keys and bot tokens from log output.
pub struct RedactingWriter<W> {
    inner: W,
}

impl RedactingWriter<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self {
            inner: std::io::stderr(),
        }
    }
}

impl<W: std::io::Write> std::io::Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let original = String::from_utf8_lossy(buf);
        let redacted = redact_secrets(&original);
        self.inner.write_all(redacted.as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl<'a> MakeWriter<'a> for RedactingWriter<std::io::Stderr> {
    type Writer = RedactingWriter<std::io::Stderr>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: std::io::stderr(),
        }
    }
}

/// Replace known credential patterns with `[REDACTED]`.
pub fn redact_secrets(input: &str) -> String {
    static PATTERNS: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
        regex::Regex::new(
            r"(?x)
              sk-or-v1-[A-Za-z0-9]{16,}      # OpenRouter keys
            | sk-[A-Za-z0-9_\-]{20,}         # OpenAI-style keys
            | tvly-[A-Za-z0-9_\-]{10,}       # Tavily keys
            | \b\d{6,12}:[A-Za-z0-9_\-]{30,} # Telegram bot tokens
            | bot\d{6,12}:[A-Za-z0-9_\-]{30,} # bot tokens embedded in API URLs
            ",
        )
        .expect("redaction regex should compile")
    });

    PATTERNS.replace_all(input, "[REDACTED]").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn redacts_openrouter_key() {
        let input = "key=sk-or-v1-0123456789abcdef0123";
        assert_eq!(redact_secrets(input), "key=[REDACTED]");
    }

    #[test]
    fn redacts_openai_key() {
        let input = "key=sk-1234567890123456789012345";
        assert_eq!(redact_secrets(input), "key=[REDACTED]");
    }

    #[test]
    fn redacts_tavily_key() {
        let input = "search failed with tvly-dev-abcdefghijklmnop";
        assert_eq!(redact_secrets(input), "search failed with [REDACTED]");
    }

    #[test]
    fn redacts_telegram_token_in_url() {
        let input =
            "error sending request for url (https://api.telegram.org/bot123456789:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsawQ/sendPhoto)";
        let redacted = redact_secrets(input);
        assert!(!redacted.contains("AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsawQ"));
        assert!(redacted.contains("[REDACTED]/sendPhoto"));
    }

    #[test]
    fn leaves_normal_text_unchanged() {
        let input = "meme delivered to chat -100123 in 1.2s";
        assert_eq!(redact_secrets(input), input);
    }

    #[test]
    fn writer_redacts_before_forwarding() {
        let mut writer = RedactingWriter { inner: Vec::new() };
        writer
            .write_all(b"token tvly-abcdefghijklmnop leaked")
            .expect("write to vec");
        let written = String::from_utf8(writer.inner).expect("utf8");
        assert_eq!(written, "token [REDACTED] leaked");
    }
}
