// SeismoNode: AT Command Builder
//
// Commands render through `Display` into an owned line, so there is no fixed
// formatting buffer to overflow. The CR LF terminator is added by the
// transport.

use std::fmt;

/// Commands understood by the ESP8266 AT firmware that the node issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtCommand<'a> {
    /// `AT`
    Probe,
    /// `ATE0`
    EchoOff,
    /// `AT+CWMODE=1`
    StationMode,
    /// `AT+CWJAP="ssid","password"`
    JoinAccessPoint { ssid: &'a str, password: &'a str },
    /// `AT+CIFSR`
    QueryAddress,
    /// `AT+CIPMUX=0|1`
    Multiplex(bool),
    /// `AT+CIPSERVER=0` or `AT+CIPSERVER=1,<port>`
    Server { port: Option<u16> },
    /// `AT+CIPSTO=<seconds>`
    ServerTimeout(u16),
    /// `AT+CIPSTATUS`
    Status,
    /// `AT+CIPSTART=<link>,"TCP","<host>",<port>`
    Connect { link: u8, host: &'a str, port: u16 },
    /// `AT+CIPSEND=<link>,<len>`
    Send { link: u8, len: usize },
    /// `AT+CIPCLOSE=<link>`
    Close { link: u8 },
}

impl AtCommand<'_> {
    pub fn line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AtCommand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Probe => f.write_str("AT"),
            Self::EchoOff => f.write_str("ATE0"),
            Self::StationMode => f.write_str("AT+CWMODE=1"),
            Self::JoinAccessPoint { ssid, password } => write!(
                f,
                "AT+CWJAP=\"{}\",\"{}\"",
                Escaped(ssid),
                Escaped(password)
            ),
            Self::QueryAddress => f.write_str("AT+CIFSR"),
            Self::Multiplex(on) => write!(f, "AT+CIPMUX={}", u8::from(*on)),
            Self::Server { port: Some(port) } => write!(f, "AT+CIPSERVER=1,{port}"),
            Self::Server { port: None } => f.write_str("AT+CIPSERVER=0"),
            Self::ServerTimeout(secs) => write!(f, "AT+CIPSTO={secs}"),
            Self::Status => f.write_str("AT+CIPSTATUS"),
            Self::Connect { link, host, port } => {
                write!(f, "AT+CIPSTART={link},\"TCP\",\"{}\",{port}", Escaped(host))
            }
            Self::Send { link, len } => write!(f, "AT+CIPSEND={link},{len}"),
            Self::Close { link } => write!(f, "AT+CIPCLOSE={link}"),
        }
    }
}

/// AT string arguments need `"`, `,` and `\` backslash-escaped.
struct Escaped<'a>(&'a str);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0.chars() {
            if matches!(c, '"' | ',' | '\\') {
                f.write_str("\\")?;
            }
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_server_commands() {
        assert_eq!(AtCommand::Multiplex(true).line(), "AT+CIPMUX=1");
        assert_eq!(AtCommand::Server { port: None }.line(), "AT+CIPSERVER=0");
        assert_eq!(AtCommand::Server { port: Some(80) }.line(), "AT+CIPSERVER=1,80");
        assert_eq!(AtCommand::ServerTimeout(10).line(), "AT+CIPSTO=10");
    }

    #[test]
    fn renders_link_commands() {
        assert_eq!(AtCommand::Send { link: 3, len: 117 }.line(), "AT+CIPSEND=3,117");
        assert_eq!(AtCommand::Close { link: 4 }.line(), "AT+CIPCLOSE=4");
        assert_eq!(
            AtCommand::Connect { link: 4, host: "10.0.0.2", port: 3000 }.line(),
            "AT+CIPSTART=4,\"TCP\",\"10.0.0.2\",3000"
        );
    }

    #[test]
    fn escapes_credentials() {
        let cmd = AtCommand::JoinAccessPoint {
            ssid: "lab,2\"g\"",
            password: "a\\b",
        };
        assert_eq!(cmd.line(), r#"AT+CWJAP="lab\,2\"g\"","a\\b""#);
    }

    #[test]
    fn long_arguments_do_not_truncate() {
        let host = "h".repeat(300);
        let line = AtCommand::Connect { link: 4, host: &host, port: 80 }.line();
        assert!(line.contains(&host));
        assert!(line.ends_with(",80"));
    }
}
