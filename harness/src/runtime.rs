//! Process-global symbols and the primitives code under test calls.
//!
//! Code under test never writes to stdout, reads stdin, or exits directly. It
//! calls [`print`], [`input`], [`exit`], [`quit`], [`now`] and [`call`], which
//! look up a symbol by dotted path on every use. Substituting a symbol (see
//! [`crate::patch`]) therefore changes what the next primitive call does.
//!
//! Each primitive first checks the calling thread's cancellation token so a
//! worker abandoned after a timeout stops at its next primitive call.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::error::Interrupt;
use crate::format::display;

pub const STDOUT: &str = "sys.stdout";
pub const INPUT: &str = "builtins.input";
pub const EXIT: &str = "builtins.exit";
pub const QUIT: &str = "builtins.quit";
pub const NOW: &str = "time.now";

/// RFC 3339 text as returned by the `time.now` binding.
pub fn timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

type CallableFn = dyn Fn(Vec<Value>, Map<String, Value>) -> Result<Value, Interrupt> + Send + Sync;

/// A function in the runtime: code under test, a builtin, or a patch replacement.
#[derive(Clone)]
pub struct Callable(Arc<CallableFn>);

impl Callable {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Vec<Value>, Map<String, Value>) -> Result<Value, Interrupt> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, args: Vec<Value>, kwargs: Map<String, Value>) -> Result<Value, Interrupt> {
        (self.0)(args, kwargs)
    }

    /// Identity comparison.
    pub fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callable(..)")
    }
}

/// Destination for text written through [`write`] and [`print`].
pub trait OutputStream: Send + Sync {
    fn write(&self, text: &str) -> Result<(), Interrupt>;
}

/// A value bound to a symbol path.
#[derive(Clone)]
pub enum Symbol {
    Function(Callable),
    Stream(Arc<dyn OutputStream>),
    Value(Value),
}

impl Symbol {
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(Vec<Value>, Map<String, Value>) -> Result<Value, Interrupt> + Send + Sync + 'static,
    {
        Self::Function(Callable::new(f))
    }

    /// Identity comparison: functions and streams by pointer, values by equality.
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Function(a), Self::Function(b)) => a.same(b),
            (Self::Stream(a), Self::Stream(b)) => Arc::ptr_eq(a, b),
            (Self::Value(a), Self::Value(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function(_) => f.write_str("Symbol::Function(..)"),
            Self::Stream(_) => f.write_str("Symbol::Stream(..)"),
            Self::Value(value) => write!(f, "Symbol::Value({value})"),
        }
    }
}

static SYMBOLS: LazyLock<RwLock<HashMap<String, Symbol>>> =
    LazyLock::new(|| RwLock::new(builtin_symbols()));

fn builtin_symbols() -> HashMap<String, Symbol> {
    let mut table = HashMap::new();
    table.insert(STDOUT.to_string(), Symbol::Stream(Arc::new(ProcessStdout)));
    table.insert(INPUT.to_string(), Symbol::function(read_stdin_line));
    table.insert(
        EXIT.to_string(),
        Symbol::function(|args, _| std::process::exit(exit_code(&args).unwrap_or(0))),
    );
    table.insert(
        QUIT.to_string(),
        Symbol::function(|args, _| std::process::exit(exit_code(&args).unwrap_or(0))),
    );
    table.insert(
        NOW.to_string(),
        Symbol::function(|_, _| Ok(Value::String(timestamp(Utc::now())))),
    );
    table
}

struct ProcessStdout;

impl OutputStream for ProcessStdout {
    fn write(&self, text: &str) -> Result<(), Interrupt> {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(text.as_bytes())
            .and_then(|()| stdout.flush())
            .map_err(|err| Interrupt::raised("OSError", err.to_string()))
    }
}

fn read_stdin_line(args: Vec<Value>, _kwargs: Map<String, Value>) -> Result<Value, Interrupt> {
    if let Some(prompt) = args.first() {
        write(&display(prompt))?;
    }
    let mut line = String::new();
    let read = std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|err| Interrupt::raised("OSError", err.to_string()))?;
    if read == 0 {
        return Err(Interrupt::EndOfInput);
    }
    let trimmed = line.trim_end_matches(['\n', '\r']);
    Ok(Value::String(trimmed.to_string()))
}

pub(crate) fn exit_code(args: &[Value]) -> Option<i32> {
    args.first()
        .and_then(Value::as_i64)
        .and_then(|code| i32::try_from(code).ok())
}

/// Look up the current binding of `path`.
pub fn lookup(path: &str) -> Option<Symbol> {
    let table = SYMBOLS.read().unwrap_or_else(PoisonError::into_inner);
    table.get(path).cloned()
}

/// Bind `path` to `symbol` (or unbind it with `None`), returning the previous binding.
pub fn replace(path: &str, symbol: Option<Symbol>) -> Option<Symbol> {
    let mut table = SYMBOLS.write().unwrap_or_else(PoisonError::into_inner);
    match symbol {
        Some(symbol) => table.insert(path.to_string(), symbol),
        None => table.remove(path),
    }
}

/// Bind `path` permanently (used by the importer to publish module objects).
pub fn define(path: &str, symbol: Symbol) {
    replace(path, Some(symbol));
}

/// Cooperative cancellation flag shared between a call and its worker thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

thread_local! {
    static CURRENT_TOKEN: RefCell<Option<CancelToken>> = const { RefCell::new(None) };
}

/// Installs a cancellation token on the current thread until dropped.
pub struct TokenScope {
    previous: Option<CancelToken>,
}

/// Attach `token` to the current thread.
pub fn enter(token: CancelToken) -> TokenScope {
    let previous = CURRENT_TOKEN.with(|slot| slot.replace(Some(token)));
    TokenScope { previous }
}

impl Drop for TokenScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_TOKEN.with(|slot| {
            slot.replace(previous);
        });
    }
}

/// Explicit cancellation point for long computations that call no other primitive.
pub fn tick() -> Result<(), Interrupt> {
    let cancelled = CURRENT_TOKEN.with(|slot| {
        slot.borrow()
            .as_ref()
            .is_some_and(CancelToken::is_cancelled)
    });
    if cancelled {
        Err(Interrupt::Cancelled)
    } else {
        Ok(())
    }
}

fn resolve_function(path: &str) -> Result<Callable, Interrupt> {
    match lookup(path) {
        Some(Symbol::Function(callable)) => Ok(callable),
        Some(_) => Err(Interrupt::raised(
            "TypeError",
            format!("`{path}` is not callable"),
        )),
        None => Err(Interrupt::MissingSymbol(path.to_string())),
    }
}

/// Write `text` to the current `sys.stdout` binding.
pub fn write(text: &str) -> Result<(), Interrupt> {
    tick()?;
    match lookup(STDOUT) {
        Some(Symbol::Stream(stream)) => stream.write(text),
        Some(_) => Err(Interrupt::raised(
            "TypeError",
            format!("`{STDOUT}` is not a stream"),
        )),
        None => Err(Interrupt::MissingSymbol(STDOUT.to_string())),
    }
}

/// Write `text` followed by a line terminator, as two separate writes.
pub fn print(text: &str) -> Result<(), Interrupt> {
    write(text)?;
    write("\n")
}

/// Show `prompt` and read one line of input.
pub fn input(prompt: &str) -> Result<String, Interrupt> {
    let value = call(INPUT, vec![Value::String(prompt.to_string())])?;
    Ok(display(&value))
}

/// Ask the runtime to terminate the process.
pub fn exit(code: Option<i32>) -> Result<Value, Interrupt> {
    call(EXIT, code.map(Value::from).into_iter().collect())
}

/// Ask the runtime to terminate the process via `quit`.
pub fn quit(code: Option<i32>) -> Result<Value, Interrupt> {
    call(QUIT, code.map(Value::from).into_iter().collect())
}

/// Current wall-clock time as seen through the `time.now` binding.
pub fn now() -> Result<DateTime<Utc>, Interrupt> {
    let value = call(NOW, Vec::new())?;
    let text = value
        .as_str()
        .ok_or_else(|| Interrupt::raised("TypeError", "`time.now` must return a string"))?;
    DateTime::parse_from_rfc3339(text)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|err| Interrupt::raised("ValueError", err.to_string()))
}

/// Call the function bound at `path` with positional arguments.
pub fn call(path: &str, args: Vec<Value>) -> Result<Value, Interrupt> {
    call_with(path, args, Map::new())
}

/// Call the function bound at `path` with positional and keyword arguments.
pub fn call_with(
    path: &str,
    args: Vec<Value>,
    kwargs: Map<String, Value>,
) -> Result<Value, Interrupt> {
    tick()?;
    let callable = resolve_function(path)?;
    callable.call(args, kwargs)
}

/// Lock a mutex, recovering the data if a panicking target poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
