//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use kodegen_bundler_package::bundler::{
    Result,
    params::{ParamId, ParamStore},
    utils::process::{ToolCommand, ToolOutput, ToolRunner},
};
use std::{
    collections::HashMap,
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

/// Scripted failure: `program` exits with `exit_code` when its arguments
/// contain `when_arg`.
#[derive(Clone, Debug)]
struct Failure {
    when_arg: String,
    exit_code: i32,
    output: String,
}

/// Recording [`ToolRunner`] that never spawns anything.
///
/// Packaging tools "produce" an empty artifact where the real tool would put
/// it, version probes answer with a plausible banner.
#[derive(Debug, Default)]
pub struct FakeRunner {
    calls: Mutex<Vec<ToolCommand>>,
    failures: Mutex<HashMap<String, Failure>>,
    clobbers: Mutex<HashMap<String, PathBuf>>,
}

impl FakeRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes `program` fail with `exit_code` whenever `when_arg` is passed.
    pub fn fail(&self, program: &str, when_arg: &str, exit_code: i32, output: &str) {
        self.failures.lock().unwrap().insert(
            program.to_string(),
            Failure {
                when_arg: when_arg.to_string(),
                exit_code,
                output: output.to_string(),
            },
        );
    }

    /// Replaces the directory `dir` with a regular file when `program` runs,
    /// so that a later attempt to delete it as a directory fails.
    pub fn clobber(&self, program: &str, dir: &Path) {
        self.clobbers
            .lock()
            .unwrap()
            .insert(program.to_string(), dir.to_path_buf());
    }

    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().unwrap().clone()
    }

    /// Programs run so far, as file names.
    pub fn programs(&self) -> Vec<String> {
        self.calls().iter().map(|c| program_name(c)).collect()
    }

    /// The first recorded call of `program` carrying `arg`.
    pub fn call_with(&self, program: &str, arg: &str) -> Option<ToolCommand> {
        self.calls()
            .into_iter()
            .find(|c| program_name(c) == program && c.args.iter().any(|a| a == arg))
    }
}

fn program_name(command: &ToolCommand) -> String {
    Path::new(&command.program)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| command.program.clone())
}

fn arg_after<'a>(command: &'a ToolCommand, flag: &str) -> Option<&'a str> {
    let idx = command.args.iter().position(|a| a == flag)?;
    command.args.get(idx + 1).map(String::as_str)
}

fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, b"artifact").unwrap();
}

#[async_trait]
impl ToolRunner for FakeRunner {
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        self.calls.lock().unwrap().push(command.clone());
        let program = program_name(command);

        if let Some(failure) = self.failures.lock().unwrap().get(&program)
            && command.args.iter().any(|a| a == &failure.when_arg)
        {
            return Ok(ToolOutput {
                exit_code: failure.exit_code,
                output: failure.output.clone(),
            });
        }

        if !command.probe_only
            && let Some(dir) = self.clobbers.lock().unwrap().get(&program)
        {
            std::fs::remove_dir_all(dir).unwrap();
            std::fs::write(dir, b"clobbered").unwrap();
        }

        let output = match program.as_str() {
            "iscc" if command.args.iter().any(|a| a == "/?") => {
                "Inno Setup 6.2.2 Command-Line Compiler".to_string()
            }
            "iscc" => {
                let out = command
                    .args
                    .iter()
                    .find_map(|a| a.strip_prefix("/o"))
                    .unwrap_or(".");
                touch(&Path::new(out).join("Hello-1.0.exe"));
                String::new()
            }
            "candle" | "light" if command.args.iter().any(|a| a == "-?") => {
                "Windows Installer XML Toolset Compiler version 3.11.2.4516".to_string()
            }
            "candle" | "light" => {
                if let Some(out) = arg_after(command, "-out") {
                    touch(Path::new(out));
                }
                String::new()
            }
            "dpkg-deb" if command.args.iter().any(|a| a == "--build") => {
                if let Some(out) = command.args.last() {
                    touch(&Path::new(out).join("hello_1.0_amd64.deb"));
                }
                String::new()
            }
            "rpmbuild" if command.args.iter().any(|a| a == "-bb") => {
                let rpmdir = command
                    .args
                    .iter()
                    .find_map(|a| a.strip_prefix("%_rpmdir "))
                    .unwrap_or(".");
                touch(&Path::new(rpmdir).join("hello-1.0-1.x86_64.rpm"));
                String::new()
            }
            "pkgbuild" | "productbuild" => {
                if let Some(out) = command.args.last() {
                    touch(Path::new(out));
                }
                String::new()
            }
            _ => format!("{program} 1.0"),
        };

        Ok(ToolOutput {
            exit_code: 0,
            output,
        })
    }
}

/// Writes a jar whose manifest names `main_class` and, optionally, a class path.
pub fn write_jar(path: &Path, main_class: Option<&str>, classpath: Option<&str>) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();

    let mut manifest = String::from("Manifest-Version: 1.0\r\n");
    if let Some(class) = main_class {
        manifest.push_str(&format!("Main-Class: {class}\r\n"));
    }
    if let Some(cp) = classpath {
        manifest.push_str(&format!("Class-Path: {cp}\r\n"));
    }
    manifest.push_str("\r\n");

    zip.start_file("META-INF/MANIFEST.MF", options).unwrap();
    zip.write_all(manifest.as_bytes()).unwrap();
    zip.start_file("com/example/Hello.class", options).unwrap();
    zip.write_all(b"\xca\xfe\xba\xbe").unwrap();
    zip.finish().unwrap();
}

/// Scratch layout of one test: input with `hello.jar`, a build root and a
/// destination directory.
pub struct Workspace {
    pub dir: tempfile::TempDir,
    pub input: PathBuf,
    pub build_root: PathBuf,
    pub dest: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input");
        std::fs::create_dir_all(&input).unwrap();
        write_jar(&input.join("hello.jar"), Some("com.example.Hello"), None);
        std::fs::write(input.join("LICENSE"), "Do what you want.\n\nNo warranty.\n").unwrap();

        Self {
            build_root: dir.path().join("build"),
            dest: dir.path().join("dist"),
            input,
            dir,
        }
    }

    /// Store seeded the way the CLI would for this workspace.
    pub fn seed(&self) -> ParamStore {
        let mut store = ParamStore::new();
        store.put_raw(ParamId::Input, self.input.display().to_string());
        store.put_raw(ParamId::MainJar, "hello.jar");
        store.put_raw(ParamId::Version, "1.0");
        store.put_raw(ParamId::Vendor, "Acme");
        store.put(ParamId::BuildRoot, self.build_root.clone());
        store
    }
}
