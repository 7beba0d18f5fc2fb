//! Command descriptors.
//!
//! A [`Command<T>`] pairs the wire arguments of one request with the
//! function that turns its reply into a `T`. The pipeline core only ever
//! looks at the arguments (to route and write them) and hands the reply to
//! the decoder, so there is one generic command type instead of a type per
//! store command.

use std::fmt;

use bytes::Bytes;
use cinder_protocol::Frame;

use crate::decode;
use crate::error::DecodeError;

/// Boxed reply decoder.
pub type Decoder<T> = Box<dyn FnOnce(Frame) -> Result<T, DecodeError> + Send>;

/// Wire arguments of a command plus which of them are keys.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandArgs {
    args: Vec<Bytes>,
    /// Indices into `args` that name keys.
    keys: Vec<usize>,
}

impl CommandArgs {
    /// Starts a command with its name as the first argument.
    pub fn new(name: impl Into<Bytes>) -> Self {
        Self {
            args: vec![name.into()],
            keys: Vec::new(),
        }
    }

    /// Appends a plain argument.
    pub fn arg(mut self, arg: impl Into<Bytes>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends an integer argument in decimal form.
    pub fn int_arg(self, n: i64) -> Self {
        let mut buf = itoa::Buffer::new();
        let digits = Bytes::copy_from_slice(buf.format(n).as_bytes());
        self.arg(digits)
    }

    /// Appends an argument that is also a routing key.
    pub fn key(mut self, key: impl Into<Bytes>) -> Self {
        self.keys.push(self.args.len());
        self.args.push(key.into());
        self
    }

    /// The command name (first argument).
    pub fn name(&self) -> &[u8] {
        &self.args[0]
    }

    /// All arguments, name first, as written to the wire.
    pub fn as_slice(&self) -> &[Bytes] {
        &self.args
    }

    /// The keys this command touches, in argument order.
    pub fn keys(&self) -> impl Iterator<Item = &Bytes> + '_ {
        self.keys.iter().map(|&i| &self.args[i])
    }

    /// Number of key arguments.
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }
}

impl fmt::Debug for CommandArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for arg in &self.args {
            list.entry(&String::from_utf8_lossy(arg));
        }
        list.finish()
    }
}

/// A command ready for submission: arguments plus reply decoder.
pub struct Command<T> {
    args: CommandArgs,
    decoder: Decoder<T>,
}

impl<T> Command<T> {
    /// Builds a command from its arguments and a decoder.
    pub fn new<F>(args: CommandArgs, decoder: F) -> Self
    where
        F: FnOnce(Frame) -> Result<T, DecodeError> + Send + 'static,
    {
        Self {
            args,
            decoder: Box::new(decoder),
        }
    }

    /// The command's arguments.
    pub fn args(&self) -> &CommandArgs {
        &self.args
    }

    /// Applies `f` to the decoded value.
    pub fn map<U, F>(self, f: F) -> Command<U>
    where
        T: 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let decoder = self.decoder;
        Command::new(self.args, move |frame| decoder(frame).map(f))
    }

    pub(crate) fn into_parts(self) -> (CommandArgs, Decoder<T>) {
        (self.args, self.decoder)
    }
}

impl Command<Frame> {
    /// A command whose reply is handed back undecoded.
    pub fn raw(args: CommandArgs) -> Self {
        Command::new(args, decode::frame)
    }
}

impl<T> fmt::Debug for Command<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// Builders for a few common key commands.
///
/// These exist so a pipeline can be driven without an external command
/// layer; anything else can be built with [`CommandArgs`] and
/// [`Command::new`].
pub mod commands {
    use bytes::Bytes;

    use super::{Command, CommandArgs};
    use crate::decode;

    /// `GET key` → the value, or `None` if the key is missing.
    pub fn get(key: impl Into<Bytes>) -> Command<Option<Bytes>> {
        Command::new(CommandArgs::new("GET").key(key), decode::optional_bytes)
    }

    /// `SET key value` → acknowledgement.
    pub fn set(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Command<()> {
        Command::new(CommandArgs::new("SET").key(key).arg(value), decode::ok)
    }

    /// `DEL key [key ...]` → number of keys removed.
    pub fn del<K, I>(keys: I) -> Command<i64>
    where
        K: Into<Bytes>,
        I: IntoIterator<Item = K>,
    {
        let args = keys.into_iter().fold(CommandArgs::new("DEL"), |a, k| a.key(k));
        Command::new(args, decode::integer)
    }

    /// `EXISTS key` → whether the key exists.
    pub fn exists(key: impl Into<Bytes>) -> Command<bool> {
        Command::new(CommandArgs::new("EXISTS").key(key), decode::boolean)
    }

    /// `INCR key` → the value after incrementing.
    pub fn incr(key: impl Into<Bytes>) -> Command<i64> {
        Command::new(CommandArgs::new("INCR").key(key), decode::integer)
    }

    /// `EXPIRE key seconds` → whether a timeout was set.
    pub fn expire(key: impl Into<Bytes>, seconds: i64) -> Command<bool> {
        Command::new(
            CommandArgs::new("EXPIRE").key(key).int_arg(seconds),
            decode::boolean,
        )
    }

    /// `TTL key` → remaining seconds, `-1` without expiry, `-2` if missing.
    pub fn ttl(key: impl Into<Bytes>) -> Command<i64> {
        Command::new(CommandArgs::new("TTL").key(key), decode::integer)
    }

    /// `MGET key [key ...]` → one optional value per key.
    pub fn mget<K, I>(keys: I) -> Command<Vec<Option<Bytes>>>
    where
        K: Into<Bytes>,
        I: IntoIterator<Item = K>,
    {
        let args = keys.into_iter().fold(CommandArgs::new("MGET"), |a, k| a.key(k));
        Command::new(args, decode::array(decode::optional_bytes))
    }
}
