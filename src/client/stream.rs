//! Blocking FTP client
//!
//! Plain `std::net` implementation of the client collaborator: one control
//! connection, passive-mode data connections, binary transfers only.

use log::{debug, info, warn};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Ipv4Addr, Shutdown, SocketAddr, SocketAddrV4, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::client::transport::{FtpConnection, FtpConnector};
use crate::error::ClientError;

const CHUNK_SIZE: usize = 8192;

/// Opens [`FtpStream`]s over TCP.
#[derive(Clone, Debug, Default)]
pub struct TcpConnector {
    timeout: Option<Duration>,
}

impl TcpConnector {
    /// `timeout` bounds connects and every socket read or write; `None`
    /// waits forever.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl FtpConnector for TcpConnector {
    fn connect(&self, host: &str, port: u16) -> Result<Box<dyn FtpConnection>, ClientError> {
        Ok(Box::new(FtpStream::connect(host, port, self.timeout)?))
    }
}

/// A parsed server reply. Multi-line replies keep only the final line's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub text: String,
}

impl Reply {
    fn into_error(self) -> ClientError {
        ClientError::Reply {
            code: self.code,
            text: self.text,
        }
    }
}

/// Control connection to an FTP server.
pub struct FtpStream {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    timeout: Option<Duration>,
    welcome: String,
}

impl FtpStream {
    pub fn connect(host: &str, port: u16, timeout: Option<Duration>) -> Result<Self, ClientError> {
        let stream = open_stream((host, port), timeout)?;
        let writer = stream.try_clone()?;
        let mut ftp = Self {
            reader: BufReader::new(stream),
            writer,
            timeout,
            welcome: String::new(),
        };

        let greeting = ftp.read_reply()?;
        let greeting = expect(greeting, &[220])?;
        info!("Connected to {}:{}: {}", host, port, greeting.text);
        ftp.welcome = greeting.text;
        Ok(ftp)
    }

    /// Text of the server's 220 greeting.
    pub fn welcome(&self) -> &str {
        &self.welcome
    }

    fn send(&mut self, command: &str) -> Result<(), ClientError> {
        if command.starts_with("PASS ") {
            debug!("-> PASS ****");
        } else {
            debug!("-> {}", command);
        }
        self.writer.write_all(command.as_bytes())?;
        self.writer.write_all(b"\r\n")?;
        self.writer.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<String, ClientError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(ClientError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "control connection closed by server",
            )));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Reads one reply, following `ddd-` continuation lines up to `ddd `.
    pub fn read_reply(&mut self) -> Result<Reply, ClientError> {
        let first = self.read_line()?;
        let code = parse_code(&first)?;
        debug!("<- {}", first);

        if first.as_bytes().get(3) != Some(&b'-') {
            return Ok(Reply {
                code,
                text: first.get(4..).unwrap_or_default().to_string(),
            });
        }

        let terminator = format!("{} ", code);
        loop {
            let line = self.read_line()?;
            debug!("<- {}", line);
            if line.starts_with(&terminator) {
                return Ok(Reply {
                    code,
                    text: line[terminator.len()..].to_string(),
                });
            }
        }
    }

    fn command(&mut self, command: &str) -> Result<Reply, ClientError> {
        self.send(command)?;
        self.read_reply()
    }

    /// Enters passive mode and opens the announced data connection.
    fn open_data(&mut self) -> Result<TcpStream, ClientError> {
        let reply = self.command("PASV")?;
        let reply = expect(reply, &[227])?;
        let addr = parse_pasv(&reply.text)?;
        debug!("Opening data connection to {}", addr);
        Ok(open_stream(addr, self.timeout)?)
    }

    /// Waits for the end-of-transfer reply after the data connection closed.
    fn finish_transfer(&mut self) -> Result<(), ClientError> {
        let reply = self.read_reply()?;
        expect(reply, &[226, 250])?;
        Ok(())
    }

    /// Tears down an interrupted data connection and consumes the server's
    /// completion reply so the next command reads its own answer.
    fn abort_transfer(&mut self, data: TcpStream, error: io::Error) -> ClientError {
        let _ = data.shutdown(Shutdown::Both);
        drop(data);
        match self.read_reply() {
            Ok(reply) => debug!("Aborted transfer closed with {} {}", reply.code, reply.text),
            Err(e) => warn!("No reply after aborted transfer: {}", e),
        }
        ClientError::Io(error)
    }
}

impl FtpConnection for FtpStream {
    fn login(&mut self, username: &str, password: &str) -> Result<(), ClientError> {
        let reply = self.command(&format!("USER {}", username))?;
        match reply.code {
            230 => {}
            331 | 332 => {
                let reply = self.command(&format!("PASS {}", password))?;
                expect(reply, &[230, 202])?;
            }
            _ => return Err(reply.into_error()),
        }
        let reply = self.command("TYPE I")?;
        expect(reply, &[200])?;
        info!("Logged in as {}", username);
        Ok(())
    }

    fn list(&mut self) -> Result<Vec<String>, ClientError> {
        let data = self.open_data()?;
        let reply = self.command("NLST")?;
        expect(reply, &[125, 150])?;

        let mut reader = BufReader::new(data);
        let mut names = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => return Err(self.abort_transfer(reader.into_inner(), e)),
            }
            let name = line.trim_end_matches(['\r', '\n']);
            if !name.is_empty() {
                names.push(name.to_string());
            }
        }
        drop(reader);
        self.finish_transfer()?;
        Ok(names)
    }

    fn size(&mut self, name: &str) -> Result<Option<u64>, ClientError> {
        let reply = self.command(&format!("SIZE {}", name))?;
        match reply.code {
            213 => reply
                .text
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ClientError::Malformed(format!("SIZE reply {:?}", reply.text))),
            550 => Ok(None),
            _ => Err(reply.into_error()),
        }
    }

    fn retrieve(
        &mut self,
        name: &str,
        sink: &mut dyn Write,
        progress: &mut dyn FnMut(u64),
    ) -> Result<u64, ClientError> {
        let mut data = self.open_data()?;
        let reply = self.command(&format!("RETR {}", name))?;
        expect(reply, &[125, 150])?;

        let copied = copy_with_progress(&mut data, sink, progress)
            .and_then(|bytes| sink.flush().map(|()| bytes));
        let bytes = match copied {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.abort_transfer(data, e)),
        };
        drop(data);
        self.finish_transfer()?;
        Ok(bytes)
    }

    fn store(
        &mut self,
        name: &str,
        source: &mut dyn Read,
        progress: &mut dyn FnMut(u64),
    ) -> Result<u64, ClientError> {
        let mut data = self.open_data()?;
        let reply = self.command(&format!("STOR {}", name))?;
        expect(reply, &[125, 150])?;

        let sent = copy_with_progress(source, &mut data, progress).and_then(|bytes| {
            data.flush()?;
            data.shutdown(Shutdown::Write)?;
            Ok(bytes)
        });
        let bytes = match sent {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.abort_transfer(data, e)),
        };
        drop(data);
        self.finish_transfer()?;
        Ok(bytes)
    }

    fn quit(&mut self) -> Result<(), ClientError> {
        let reply = self.command("QUIT")?;
        expect(reply, &[221])?;
        let _ = self.writer.shutdown(Shutdown::Both);
        Ok(())
    }
}

fn open_stream<A: ToSocketAddrs>(addr: A, timeout: Option<Duration>) -> io::Result<TcpStream> {
    let stream = match timeout {
        Some(limit) => {
            let mut last_error = None;
            let mut connected = None;
            for candidate in addr.to_socket_addrs()? {
                match TcpStream::connect_timeout(&candidate, limit) {
                    Ok(stream) => {
                        connected = Some(stream);
                        break;
                    }
                    Err(e) => last_error = Some(e),
                }
            }
            match connected {
                Some(stream) => stream,
                None => {
                    return Err(last_error.unwrap_or_else(|| {
                        io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
                    }));
                }
            }
        }
        None => TcpStream::connect(addr)?,
    };
    stream.set_read_timeout(timeout)?;
    stream.set_write_timeout(timeout)?;
    Ok(stream)
}

fn copy_with_progress(
    source: &mut dyn Read,
    sink: &mut dyn Write,
    progress: &mut dyn FnMut(u64),
) -> io::Result<u64> {
    let mut buffer = [0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = match source.read(&mut buffer) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        sink.write_all(&buffer[..n])?;
        total += n as u64;
        progress(total);
    }
}

/// Accepts `reply` if its code is one of `codes`.
fn expect(reply: Reply, codes: &[u16]) -> Result<Reply, ClientError> {
    if codes.contains(&reply.code) {
        Ok(reply)
    } else {
        Err(reply.into_error())
    }
}

/// Extracts the three-digit code at the start of a reply line.
pub fn parse_code(line: &str) -> Result<u16, ClientError> {
    let digits = line.get(..3).unwrap_or_default();
    let separator = line.as_bytes().get(3).copied();
    if digits.len() != 3
        || !digits.bytes().all(|b| b.is_ascii_digit())
        || !matches!(separator, None | Some(b' ') | Some(b'-'))
    {
        return Err(ClientError::Malformed(line.to_string()));
    }
    digits
        .parse()
        .map_err(|_| ClientError::Malformed(line.to_string()))
}

/// Parses the `(h1,h2,h3,h4,p1,p2)` address of a 227 reply.
pub fn parse_pasv(text: &str) -> Result<SocketAddr, ClientError> {
    let malformed = || ClientError::Malformed(format!("PASV reply {:?}", text));

    let start = text.find('(').ok_or_else(malformed)?;
    let end = text[start..].find(')').ok_or_else(malformed)? + start;
    let fields = text[start + 1..end]
        .split(',')
        .map(|field| field.trim().parse::<u8>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| malformed())?;

    if fields.len() != 6 {
        return Err(malformed());
    }
    let ip = Ipv4Addr::new(fields[0], fields[1], fields[2], fields[3]);
    let port = u16::from(fields[4]) << 8 | u16::from(fields[5]);
    Ok(SocketAddr::V4(SocketAddrV4::new(ip, port)))
}
