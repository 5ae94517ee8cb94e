use std::fmt;

/// An inline command line ready to be sent to Redis.
///
/// Arguments containing whitespace, quotes or control characters are
/// double-quoted and escaped, so they reach the server as a single argument.
///
/// # Example
///
/// ```
/// use redlink::Cmd;
///
/// let cmd = Cmd::new("SET").arg("greeting").arg("hello world");
/// assert_eq!(cmd.to_string(), "SET greeting \"hello world\"");
/// ```
#[derive(Debug, Clone)]
pub struct Cmd {
    args: Vec<String>,
}

impl Cmd {
    /// Creates a new command with the given name.
    ///
    /// # Arguments
    ///
    /// * `name` - The command name (e.g., "GET", "SET", "DEL")
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            args: vec![name.into()],
        }
    }

    /// Appends an argument to the command.
    #[inline]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

fn needs_quoting(arg: &str) -> bool {
    arg.is_empty()
        || arg
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '"' || c == '\'' || c == '\\')
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            if !needs_quoting(arg) {
                f.write_str(arg)?;
                continue;
            }
            f.write_str("\"")?;
            for c in arg.chars() {
                match c {
                    '"' => f.write_str("\\\"")?,
                    '\\' => f.write_str("\\\\")?,
                    '\n' => f.write_str("\\n")?,
                    '\r' => f.write_str("\\r")?,
                    '\t' => f.write_str("\\t")?,
                    c if c.is_control() => write!(f, "\\x{:02x}", c as u32)?,
                    c => write!(f, "{}", c)?,
                }
            }
            f.write_str("\"")?;
        }
        Ok(())
    }
}

/// Creates an AUTH command with a single password or token.
#[inline]
pub fn auth(password: impl Into<String>) -> Cmd {
    Cmd::new("AUTH").arg(password)
}

/// Creates an AUTH command for ACL authentication.
#[inline]
pub fn auth_with_username(username: impl Into<String>, password: impl Into<String>) -> Cmd {
    Cmd::new("AUTH").arg(username).arg(password)
}

/// Creates a CLIENT SETNAME command.
#[inline]
pub fn client_setname(name: impl Into<String>) -> Cmd {
    Cmd::new("CLIENT").arg("SETNAME").arg(name)
}
