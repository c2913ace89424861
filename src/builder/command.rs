//! Composable build commands.
//!
//! A [`CommandValue`] is an ordered list of typed fragments plus the two
//! timestamps that decide whether the command needs to run at all:
//!
//! - `latest_input` starts at [`Stamp::Origin`] and only ever rises as
//!   inputs are declared. A missing input pushes it to [`Stamp::Infinite`].
//! - `earliest_output` starts at [`Stamp::Infinite`] and only ever falls as
//!   outputs are declared. A missing output pulls it down to [`Stamp::Origin`].
//!
//! The command is up to date when some output was declared and every input
//! is older than every output. There is no dependency graph beyond that.
//!
//! Every operation consumes or borrows the value and returns a new one, so
//! a template command can be cloned freely and specialised per file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::error::BuildError;
use super::token::ArgumentToken;
use super::toolchain::Toolchain;

/// A point on the staleness axis.
///
/// Ordered `Origin < At(_) < Infinite`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stamp {
    /// Older than any file.
    Origin,
    /// A file modification time.
    At(SystemTime),
    /// Newer than any file.
    Infinite,
}

impl Stamp {
    /// Read the modification time of `path`, if it exists.
    pub fn of(path: &Path) -> Option<Stamp> {
        std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(Stamp::At)
    }

    /// Check if this stamp is a real point in time or the origin.
    pub fn is_finite(&self) -> bool {
        !matches!(self, Stamp::Infinite)
    }
}

/// The kind of build action a command performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Compile,
    Link,
    Archive,
    /// Free-form shell text (chained commands, scripts).
    Plain,
}

impl ActionKind {
    /// Get the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Compile => "compile",
            ActionKind::Link => "link",
            ActionKind::Archive => "archive",
            ActionKind::Plain => "plain",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a fragment means inside its command.
///
/// Roles let link-merging and flag removal work on structure instead of
/// searching the rendered text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The program being invoked.
    Program,
    /// Fixed switches a toolchain always emits after the program.
    Preamble,
    /// The "compile, don't link" switch.
    CompileOnly,
    Source,
    ObjectOutput,
    ExecutableOutput,
    ArchiveOutput,
    /// Shell or toolchain separators such as `&&` or `/link`.
    Separator,
    Argument,
}

/// Renderable payload of a fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Piece {
    Text(String),
    /// Rendered double-quoted.
    Path(PathBuf),
}

/// Whether a path fragment is read or written by the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Io {
    Input,
    Output,
}

/// One rendered argument (or part of one) of a command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fragment {
    pub role: Role,
    pub piece: Piece,
    /// Glue to the previous fragment without a space (`-I` + `"dir"`).
    pub joined: bool,
    pub io: Option<Io>,
}

impl Fragment {
    /// Create a text fragment.
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Fragment {
            role,
            piece: Piece::Text(text.into()),
            joined: false,
            io: None,
        }
    }

    /// Create a plain argument fragment.
    pub fn arg(text: impl Into<String>) -> Self {
        Fragment::text(Role::Argument, text)
    }

    /// Create a quoted path fragment.
    pub fn path(role: Role, path: impl Into<PathBuf>) -> Self {
        Fragment {
            role,
            piece: Piece::Path(path.into()),
            joined: false,
            io: None,
        }
    }

    /// Glue this fragment to the previous one.
    pub fn joined(mut self) -> Self {
        self.joined = true;
        self
    }

    /// Mark this path as read by the command.
    pub fn input(mut self) -> Self {
        self.io = Some(Io::Input);
        self
    }

    /// Mark this path as written by the command.
    pub fn output(mut self) -> Self {
        self.io = Some(Io::Output);
        self
    }

    /// The path carried by this fragment, if any.
    pub fn as_path(&self) -> Option<&Path> {
        match &self.piece {
            Piece::Path(p) => Some(p),
            Piece::Text(_) => None,
        }
    }

    fn render(&self) -> String {
        match &self.piece {
            Piece::Text(text) => text.clone(),
            Piece::Path(path) => quote(path),
        }
    }
}

/// Quote a path for the shell.
pub fn quote(path: &Path) -> String {
    format!("\"{}\"", path.display())
}

/// A build action: invocation fragments, a working directory, and staleness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandValue {
    kind: ActionKind,
    fragments: Vec<Fragment>,
    working_directory: PathBuf,
    latest_input: Stamp,
    earliest_output: Stamp,
}

impl CommandValue {
    /// Create an empty command of the given kind.
    pub fn new(kind: ActionKind, working_directory: impl Into<PathBuf>) -> Self {
        CommandValue {
            kind,
            fragments: Vec::new(),
            working_directory: working_directory.into(),
            latest_input: Stamp::Origin,
            earliest_output: Stamp::Infinite,
        }
    }

    /// Create an empty free-form command.
    pub fn plain(working_directory: impl Into<PathBuf>) -> Self {
        CommandValue::new(ActionKind::Plain, working_directory)
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn latest_input(&self) -> Stamp {
        self.latest_input
    }

    pub fn earliest_output(&self) -> Stamp {
        self.earliest_output
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Run the command from a different directory.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = dir.into();
        self
    }

    /// Render the command line.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for (i, fragment) in self.fragments.iter().enumerate() {
            if i > 0 && !fragment.joined {
                out.push(' ');
            }
            out.push_str(&fragment.render());
        }
        out
    }

    /// Check whether every declared output is newer than every declared input.
    pub fn is_up_to_date(&self) -> bool {
        self.earliest_output.is_finite() && self.latest_input < self.earliest_output
    }

    /// Append raw text, separated by a space unless `joined`.
    pub fn append(self, text: impl Into<String>, joined: bool) -> Self {
        let fragment = Fragment::arg(text);
        self.push(if joined { fragment.joined() } else { fragment })
    }

    /// Append a quoted path, separated by a space unless `joined`.
    pub fn append_path(self, path: impl Into<PathBuf>, joined: bool) -> Self {
        let fragment = Fragment::path(Role::Argument, path);
        self.push(if joined { fragment.joined() } else { fragment })
    }

    /// Raise `latest_input` to the modification time of `path`.
    ///
    /// A missing input makes the command infinitely stale.
    pub fn declare_input(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Stamp::of(path) {
            Some(stamp) => self.latest_input = self.latest_input.max(stamp),
            None => {
                tracing::debug!(
                    "{}",
                    BuildError::MissingInput {
                        path: path.to_path_buf()
                    }
                );
                self.latest_input = Stamp::Infinite;
            }
        }
        self
    }

    /// Like [`declare_input`](Self::declare_input), but a missing file is ignored.
    pub fn declare_optional_input(mut self, path: impl AsRef<Path>) -> Self {
        if let Some(stamp) = Stamp::of(path.as_ref()) {
            self.latest_input = self.latest_input.max(stamp);
        }
        self
    }

    /// Lower `earliest_output` to the modification time of `path`.
    ///
    /// A missing output makes the command infinitely old.
    pub fn declare_output(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Stamp::of(path) {
            Some(stamp) => self.earliest_output = self.earliest_output.min(stamp),
            None => {
                tracing::debug!(
                    "{}",
                    BuildError::MissingOutput {
                        path: path.to_path_buf()
                    }
                );
                self.earliest_output = Stamp::Origin;
            }
        }
        self
    }

    /// Like [`declare_output`](Self::declare_output), but a missing file is ignored.
    pub fn declare_optional_output(mut self, path: impl AsRef<Path>) -> Self {
        if let Some(stamp) = Stamp::of(path.as_ref()) {
            self.earliest_output = self.earliest_output.min(stamp);
        }
        self
    }

    /// Run `next` only if this command succeeds (`a && b`).
    ///
    /// Staleness is not carried over; declare inputs and outputs on the
    /// result if it should ever be skipped.
    pub fn chain(self, next: CommandValue) -> Self {
        let mut fragments = self.fragments;
        let mut rest = next.fragments.into_iter();
        if let Some(mut first) = rest.next() {
            first.joined = false;
            if !fragments.is_empty() {
                fragments.push(Fragment::text(Role::Separator, "&&"));
            }
            fragments.push(first);
            fragments.extend(rest);
        }

        CommandValue {
            kind: ActionKind::Plain,
            fragments,
            working_directory: self.working_directory,
            latest_input: Stamp::Origin,
            earliest_output: Stamp::Infinite,
        }
    }

    /// Append all fragments of `other` and fold its staleness into this one.
    pub fn concat(mut self, other: CommandValue) -> Self {
        self.fragments.extend(other.fragments);
        self.latest_input = self.latest_input.max(other.latest_input);
        self.earliest_output = self.earliest_output.min(other.earliest_output);
        self
    }

    /// Append one fragment, declaring its path if it is marked as input or output.
    pub fn push(mut self, fragment: Fragment) -> Self {
        if let (Some(io), Some(path)) = (fragment.io, fragment.as_path()) {
            let path = path.to_path_buf();
            self = match io {
                Io::Input => self.declare_input(&path),
                Io::Output => self.declare_output(&path),
            };
        }

        if fragment.role == Role::ArchiveOutput {
            // Archivers want the library before the members.
            let at = self
                .fragments
                .iter()
                .take_while(|f| {
                    matches!(f.role, Role::Program | Role::Preamble | Role::ArchiveOutput)
                })
                .count();
            self.fragments.insert(at, fragment);
        } else {
            self.fragments.push(fragment);
        }
        self
    }

    /// Append several fragments in order.
    pub fn extend(self, fragments: impl IntoIterator<Item = Fragment>) -> Self {
        fragments.into_iter().fold(self, CommandValue::push)
    }

    /// Drop every fragment with the given role.
    pub fn without(mut self, role: Role) -> Self {
        self.fragments.retain(|f| f.role != role);
        self
    }

    /// Forget every declared output.
    pub(crate) fn reset_outputs(mut self) -> Self {
        self.earliest_output = Stamp::Infinite;
        self
    }

    /// Fold another command's staleness into this one without touching text.
    pub(crate) fn absorb_staleness(mut self, other: &CommandValue) -> Self {
        self.latest_input = self.latest_input.max(other.latest_input);
        self.earliest_output = self.earliest_output.min(other.earliest_output);
        self
    }

    /// Translate `token` through `toolchain` and append it.
    ///
    /// Fails with [`BuildError::UnsupportedFeature`] if the toolchain has no
    /// spelling for the token in this kind of command.
    pub fn try_add(
        &self,
        toolchain: &dyn Toolchain,
        token: impl Into<ArgumentToken>,
    ) -> Result<CommandValue, BuildError> {
        toolchain.apply(self, &token.into())
    }

    /// Translate `token` through `toolchain` and append it.
    ///
    /// Unsupported tokens are reported as warnings and the command is
    /// returned unchanged.
    pub fn add(self, toolchain: &dyn Toolchain, token: impl Into<ArgumentToken>) -> Self {
        match toolchain.apply(&self, &token.into()) {
            Ok(cmd) => cmd,
            Err(e) => {
                tracing::warn!("{}", e);
                self
            }
        }
    }

    /// The executable this command writes, if one was named.
    pub fn executable_output(&self) -> Option<&Path> {
        self.fragments
            .iter()
            .filter(|f| f.role == Role::ExecutableOutput)
            .find_map(Fragment::as_path)
    }

    /// The first source file of this command.
    pub fn first_source(&self) -> Option<&Path> {
        self.fragments
            .iter()
            .filter(|f| f.role == Role::Source)
            .find_map(Fragment::as_path)
    }
}

impl fmt::Display for CommandValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::TempDir;

    fn touch(path: &Path, secs: u64) {
        let file = File::create(path).unwrap();
        file.set_modified(UNIX_EPOCH + Duration::from_secs(secs)).unwrap();
    }

    fn at(secs: u64) -> Stamp {
        Stamp::At(UNIX_EPOCH + Duration::from_secs(secs))
    }

    #[test]
    fn test_append_spacing() {
        let cmd = CommandValue::plain(".")
            .append("g++", false)
            .append("-I", false)
            .append_path("inc dir", true)
            .append("-c", false);
        assert_eq!(cmd.text(), "g++ -I\"inc dir\" -c");
    }

    #[test]
    fn test_append_to_empty_has_no_leading_space() {
        assert_eq!(CommandValue::plain(".").append("cc", false).text(), "cc");
        assert_eq!(CommandValue::plain(".").append("cc", true).text(), "cc");
    }

    #[test]
    fn test_append_preserves_staleness_and_dir() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("a.c");
        touch(&input, 100);

        let cmd = CommandValue::plain(tmp.path()).declare_input(&input);
        let appended = cmd.clone().append("x", false).append_path("y", true);
        assert_eq!(appended.latest_input(), cmd.latest_input());
        assert_eq!(appended.earliest_output(), cmd.earliest_output());
        assert_eq!(appended.working_directory(), tmp.path());
    }

    #[test]
    fn test_concat_grouping_is_associative() {
        let base = CommandValue::plain(".").append("cc", false);
        let a = CommandValue::plain(".").append("-c", false);
        let b = CommandValue::plain(".").append("-I", false);
        let c = CommandValue::plain(".").append_path("inc", true);

        let left = base.clone().concat(a.clone()).concat(b.clone()).concat(c.clone());
        let right = base.clone().concat(a.clone().concat(b.clone().concat(c.clone())));
        let sequential = base
            .append("-c", false)
            .append("-I", false)
            .append_path("inc", true);

        assert_eq!(left.text(), "cc -c -I\"inc\"");
        assert_eq!(left.text(), right.text());
        assert_eq!(left.text(), sequential.text());
    }

    #[test]
    fn test_staleness_aggregation_is_order_independent() {
        let tmp = TempDir::new().unwrap();
        let (x, y, z) = (tmp.path().join("x"), tmp.path().join("y"), tmp.path().join("z"));
        touch(&x, 100);
        touch(&y, 300);
        touch(&z, 200);

        let forward = CommandValue::plain(".")
            .declare_input(&x)
            .declare_input(&y)
            .declare_input(&z)
            .declare_output(&x)
            .declare_output(&y);
        let backward = CommandValue::plain(".")
            .declare_output(&y)
            .declare_input(&z)
            .declare_output(&x)
            .declare_input(&y)
            .declare_input(&x);

        assert_eq!(forward.latest_input(), at(300));
        assert_eq!(forward.earliest_output(), at(100));
        assert_eq!(forward.latest_input(), backward.latest_input());
        assert_eq!(forward.earliest_output(), backward.earliest_output());
    }

    #[test]
    fn test_staleness_is_monotonic() {
        let tmp = TempDir::new().unwrap();
        let files: Vec<PathBuf> = [500, 100, 900, 300]
            .iter()
            .enumerate()
            .map(|(i, secs)| {
                let p = tmp.path().join(format!("f{}", i));
                touch(&p, *secs);
                p
            })
            .collect();
        let missing = tmp.path().join("missing");

        let mut cmd = CommandValue::plain(".");
        let mut steps: Vec<Box<dyn Fn(CommandValue) -> CommandValue>> = Vec::new();
        for f in &files {
            let (fi, fo) = (f.clone(), f.clone());
            steps.push(Box::new(move |c: CommandValue| c.declare_input(&fi)));
            steps.push(Box::new(move |c: CommandValue| c.declare_output(&fo)));
        }
        let (mi, mo) = (missing.clone(), missing.clone());
        steps.push(Box::new(move |c: CommandValue| c.declare_input(&mi)));
        steps.push(Box::new(move |c: CommandValue| c.declare_output(&mo)));
        steps.push(Box::new({
            let f = files[0].clone();
            move |c: CommandValue| c.declare_input(&f).declare_output(&f)
        }));

        for step in &steps {
            let before = (cmd.latest_input(), cmd.earliest_output());
            cmd = step(cmd);
            assert!(cmd.latest_input() >= before.0);
            assert!(cmd.earliest_output() <= before.1);
        }
        assert_eq!(cmd.latest_input(), Stamp::Infinite);
        assert_eq!(cmd.earliest_output(), Stamp::Origin);
    }

    #[test]
    fn test_up_to_date_when_inputs_older() {
        let tmp = TempDir::new().unwrap();
        let (input, output) = (tmp.path().join("in.c"), tmp.path().join("out.o"));
        touch(&input, 100);
        touch(&output, 200);

        let cmd = CommandValue::plain(".").declare_input(&input).declare_output(&output);
        assert!(cmd.is_up_to_date());

        touch(&input, 300);
        let cmd = CommandValue::plain(".").declare_input(&input).declare_output(&output);
        assert!(!cmd.is_up_to_date());
    }

    #[test]
    fn test_missing_files_force_execution() {
        let tmp = TempDir::new().unwrap();
        let (input, output) = (tmp.path().join("in.c"), tmp.path().join("out.o"));
        let missing = tmp.path().join("nope");
        touch(&input, 100);
        touch(&output, 10_000);

        let missing_input = CommandValue::plain(".")
            .declare_input(&input)
            .declare_input(&missing)
            .declare_output(&output);
        assert_eq!(missing_input.latest_input(), Stamp::Infinite);
        assert!(!missing_input.is_up_to_date());

        let missing_output = CommandValue::plain(".")
            .declare_input(&input)
            .declare_output(&output)
            .declare_output(&missing);
        assert_eq!(missing_output.earliest_output(), Stamp::Origin);
        assert!(!missing_output.is_up_to_date());
    }

    #[test]
    fn test_optional_declarations_tolerate_missing() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        let cmd = CommandValue::plain(".")
            .declare_optional_input(&missing)
            .declare_optional_output(&missing);
        assert_eq!(cmd.latest_input(), Stamp::Origin);
        assert_eq!(cmd.earliest_output(), Stamp::Infinite);
    }

    #[test]
    fn test_no_outputs_is_never_up_to_date() {
        let cmd = CommandValue::plain(".").append("echo", false);
        assert!(!cmd.is_up_to_date());
    }

    #[test]
    fn test_chain_renders_and_resets_staleness() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("out");
        touch(&out, 100);

        let a = CommandValue::plain(tmp.path()).append("make", false).declare_output(&out);
        let b = CommandValue::plain(".").append("echo", false).append("done", false);
        let chained = a.chain(b);

        assert_eq!(chained.text(), "make && echo done");
        assert_eq!(chained.kind(), ActionKind::Plain);
        assert_eq!(chained.working_directory(), tmp.path());
        assert_eq!(chained.latest_input(), Stamp::Origin);
        assert_eq!(chained.earliest_output(), Stamp::Infinite);
    }

    #[test]
    fn test_chain_with_empty_side() {
        let a = CommandValue::plain(".");
        let b = CommandValue::plain(".").append("ls", false);
        assert_eq!(a.chain(b.clone()).text(), "ls");
        assert_eq!(b.chain(CommandValue::plain(".")).text(), "ls");
    }

    #[test]
    fn test_archive_output_goes_first() {
        let cmd = CommandValue::new(ActionKind::Archive, ".")
            .push(Fragment::text(Role::Program, "ar"))
            .push(Fragment::text(Role::Preamble, "rcs"))
            .push(Fragment::path(Role::Argument, "a.o"))
            .push(Fragment::path(Role::ArchiveOutput, "libx.a"));
        assert_eq!(cmd.text(), "ar rcs \"libx.a\" \"a.o\"");
    }

    #[test]
    fn test_without_role() {
        let cmd = CommandValue::new(ActionKind::Compile, ".")
            .push(Fragment::text(Role::Program, "g++"))
            .push(Fragment::text(Role::CompileOnly, "-c"))
            .push(Fragment::path(Role::Source, "a.cpp"));
        assert_eq!(cmd.without(Role::CompileOnly).text(), "g++ \"a.cpp\"");
    }

    #[test]
    fn test_stamp_ordering() {
        assert!(Stamp::Origin < at(0));
        assert!(at(5) < at(6));
        assert!(at(u32::MAX as u64) < Stamp::Infinite);
        assert!(Stamp::Origin.is_finite());
        assert!(!Stamp::Infinite.is_finite());
    }
}
