//! spool-cli : bibliothèque interne du binaire `spool`
//!
//! But : garder la logique testable hors de `main.rs` (qui ne fait que le
//! parsing d'arguments et l'initialisation).
//!
//! Points clés :
//! - Compilation par lot : tous les fichiers partagent une même base de
//!   déclarations ; un fichier en échec est signalé puis ignoré
//! - Sorties : bytecode (`<stem>.spb`), désassemblage ou AST en JSON
//! - Désassemblage d'un `.spb` existant
//! - Traces (`feature = "trace"`) et couleurs (`feature = "color"`) optionnelles

#![deny(unused_must_use)]
#![forbid(unsafe_code)]

use std::{
    fs,
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{anyhow, Context, Result};

#[cfg(feature = "color")]
use owo_colors::{OwoColorize, Stream, Style};

use spool_ast::DeclRef;
use spool_compiler::{CompileError, Compiler, CompilerOptions};
use spool_core::{
    bytecode::{encode_units, read_units},
    disasm::disassemble_units,
    SourceId,
};

/// Extension des fichiers de bytecode.
pub const BYTECODE_EXT: &str = "spb";

// ───────────────────────────── Types publics ─────────────────────────────

/// Commande haut-niveau (sans parsing CLI, réservé à main.rs).
#[derive(Clone, Debug)]
pub enum Command {
    /// Compile un ou plusieurs fichiers source.
    Compile(CompileTask),
    /// Désassemble un bytecode.
    Disasm(DisasmTask),
}

/// Ce que `compile` produit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Emit {
    /// `<stem>.spb`
    #[default]
    Bytecode,
    /// Listing lisible
    Disasm,
    /// Déclarations en JSON (sans compilation)
    Ast,
}

/// Paramètres de `compile`.
#[derive(Clone, Debug, Default)]
pub struct CompileTask {
    /// Fichiers source.
    pub inputs: Vec<PathBuf>,
    /// Dossier de sortie (sinon à côté de chaque source ; stdout pour les listings).
    pub out_dir: Option<PathBuf>,
    /// Sortie voulue.
    pub emit: Emit,
    /// Toute erreur syntaxique rejette le fichier.
    pub strict: bool,
    /// Afficher le temps par fichier.
    pub time: bool,
}

/// Paramètres de `disasm`.
#[derive(Clone, Debug, Default)]
pub struct DisasmTask {
    /// Bytecode.
    pub input: PathBuf,
    /// Sortie texte.
    pub output: Output,
}

/// Sortie texte.
#[derive(Clone, Debug, Default)]
pub enum Output {
    /// Fichier.
    Path(PathBuf),
    /// Sortie standard.
    #[default]
    Stdout,
}

// ───────────────────────────── Initialisation ─────────────────────────────

/// Initialise le logger ; `RUST_LOG` l'emporte sur `default_level`.
pub fn init_logger(default_level: &str) {
    #[cfg(feature = "trace")]
    {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_secs()
            .try_init();
    }
    #[cfg(not(feature = "trace"))]
    let _ = default_level;
}

// ───────────────────────────── Exécution ─────────────────────────────

/// Exécute une commande. Retourne un code de sortie.
pub fn execute(cmd: Command) -> Result<i32> {
    match cmd {
        Command::Compile(t) => compile_entry(&t),
        Command::Disasm(t) => {
            disasm_entry(&t)?;
            Ok(0)
        }
    }
}

fn compile_entry(task: &CompileTask) -> Result<i32> {
    if task.inputs.is_empty() {
        anyhow::bail!("aucun fichier source");
    }
    let mut compiler = Compiler::new(CompilerOptions { strict_parse: task.strict, ..CompilerOptions::default() });
    let mut failures = 0usize;

    // 1) Toutes les sources d'abord : chaque fichier voit les classes des autres.
    let mut added: Vec<(PathBuf, SourceId)> = Vec::with_capacity(task.inputs.len());
    for path in &task.inputs {
        let src = fs::read_to_string(path).with_context(|| format!("lecture: {}", display(path)))?;
        match compiler.add_source(display(path), &src) {
            Ok(id) => added.push((path.clone(), id)),
            Err(e) => {
                failures += 1;
                status_fail("FAILED", &format!("{}: {}", display(path), describe(&e)));
            }
        }
    }
    for d in compiler.take_diagnostics() {
        eprintln!("{d}");
    }

    // 2) Puis chaque fichier : analyse + génération.
    for (path, id) in added {
        let start = Instant::now();
        let result = match task.emit {
            Emit::Ast => ast_json(&compiler, id).map(String::into_bytes),
            Emit::Bytecode => compile_one(&mut compiler, id, false),
            Emit::Disasm => compile_one(&mut compiler, id, true),
        };
        let elapsed = start.elapsed();

        match result {
            Ok(bytes) => {
                let written = write_output(task, &path, &bytes)?;
                status_ok("COMPILE", &written);
            }
            Err(e) => {
                failures += 1;
                status_fail("FAILED", &format!("{}: {e:#}", display(&path)));
            }
        }
        if task.time {
            status_info("TIME", &format!("{}: {} ms", display(&path), elapsed.as_millis()));
        }
    }

    log::debug!("{} file(s), {failures} failure(s)", task.inputs.len());
    Ok(i32::from(failures > 0))
}

fn compile_one(compiler: &mut Compiler, id: SourceId, listing: bool) -> Result<Vec<u8>> {
    let units = compiler.compile_file(id).map_err(|e| anyhow!(describe(&e)))?;
    if listing {
        Ok(disassemble_units(&units).into_bytes())
    } else {
        Ok(encode_units(&units)?)
    }
}

/// Déclarations d'un fichier, telles qu'analysées.
fn ast_json(compiler: &Compiler, id: SourceId) -> Result<String> {
    let file = compiler.file(id).ok_or_else(|| anyhow!("source inconnue"))?;
    let db = compiler.db();
    let mut decls = serde_json::Map::new();
    for (name, entry) in &file.declarations {
        let node = match *entry {
            DeclRef::Type(t) => serde_json::to_value(db.type_node(t))?,
            DeclRef::Function(f) => serde_json::to_value(db.function(f))?,
            DeclRef::Variable(v) => serde_json::to_value(db.variable(v))?,
        };
        decls.insert(name.clone(), node);
    }
    let imports: Vec<String> = file.imports.iter().map(ToString::to_string).collect();
    let doc = serde_json::json!({
        "namespace": file.namespace,
        "imports": imports,
        "declarations": decls,
    });
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Écrit la sortie d'un fichier ; renvoie sa destination.
fn write_output(task: &CompileTask, src: &Path, bytes: &[u8]) -> Result<String> {
    let ext = match task.emit {
        Emit::Bytecode => BYTECODE_EXT,
        Emit::Disasm => "dis",
        Emit::Ast => "ast.json",
    };
    let dest = match (&task.out_dir, task.emit) {
        (Some(dir), _) => {
            fs::create_dir_all(dir).with_context(|| format!("création: {}", display(dir)))?;
            dir.join(output_name(src, ext))
        }
        (None, Emit::Bytecode) => src.with_file_name(output_name(src, ext)),
        (None, _) => {
            let mut w = BufWriter::new(io::stdout().lock());
            w.write_all(bytes)?;
            w.flush()?;
            return Ok("<stdout>".into());
        }
    };
    write_bytes_atomic(&dest, bytes).with_context(|| format!("écriture de {}", display(&dest)))?;
    Ok(display(&dest))
}

fn disasm_entry(task: &DisasmTask) -> Result<()> {
    let bytes = fs::read(&task.input).with_context(|| format!("lecture bytecode: {}", display(&task.input)))?;
    let units = read_units(&bytes).with_context(|| format!("bytecode invalide: {}", display(&task.input)))?;
    let text = disassemble_units(&units);
    match task.output {
        Output::Stdout => {
            let mut w = BufWriter::new(io::stdout().lock());
            w.write_all(text.as_bytes())?;
            w.flush()?;
        }
        Output::Path(ref p) => write_bytes_atomic(p, text.as_bytes())?,
    }
    status_ok("DISASM", &display(&task.input));
    Ok(())
}

/// Toutes les erreurs sémantiques, une par ligne.
fn describe(e: &CompileError) -> String {
    match e {
        CompileError::Semantic(errors) => {
            errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n  ")
        }
        other => other.to_string(),
    }
}

// ───────────────────────────── Utilitaires E/S ─────────────────────────────

fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = unique_tmp_path(parent, path.file_name().unwrap_or_default());
    {
        let mut w = BufWriter::new(File::create(&tmp)?);
        w.write_all(bytes)?;
        w.flush()?;
    }
    if path.exists() {
        // Windows : Rename sur cible existante peut échouer
        let _ = fs::remove_file(path);
    }
    fs::rename(&tmp, path)
        .or_else(|_| fs::copy(&tmp, path).map(drop).and_then(|()| fs::remove_file(&tmp)))?;
    Ok(())
}

fn unique_tmp_path(dir: &Path, base: &std::ffi::OsStr) -> PathBuf {
    let mut i = 0u32;
    loop {
        let candidate = dir.join(format!("{}.tmp{i}", base.to_string_lossy()));
        if !candidate.exists() {
            return candidate;
        }
        i = i.wrapping_add(1);
    }
}

fn output_name(src: &Path, ext: &str) -> String {
    let stem = src.file_stem().and_then(|s| s.to_str()).unwrap_or("out");
    format!("{stem}.{ext}")
}

fn display(p: &Path) -> String {
    p.to_string_lossy().to_string()
}

// ───────────────────────────── Sorties jolies ─────────────────────────────

/// Couleur seulement si stderr la supporte (ou si `--color` l'impose).
#[cfg(feature = "color")]
fn paint(tag: &str, style: Style) -> String {
    tag.if_supports_color(Stream::Stderr, |t| t.style(style)).to_string()
}

fn status_ok(tag: &str, msg: &str) {
    #[cfg(feature = "color")]
    eprintln!("{} {msg}", paint(tag, Style::new().green().bold()));
    #[cfg(not(feature = "color"))]
    eprintln!("{tag} {msg}");
}

fn status_fail(tag: &str, msg: &str) {
    #[cfg(feature = "color")]
    eprintln!("{} {msg}", paint(tag, Style::new().red().bold()));
    #[cfg(not(feature = "color"))]
    eprintln!("{tag} {msg}");
}

fn status_info(tag: &str, msg: &str) {
    #[cfg(feature = "color")]
    eprintln!("{} {msg}", paint(tag, Style::new().blue().bold()));
    #[cfg(not(feature = "color"))]
    eprintln!("{tag} {msg}");
}

// ───────────────────────────── Tests ─────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(dir: &Path, name: &str, src: &str) -> PathBuf {
        let p = dir.join(name);
        fs::write(&p, src).unwrap();
        p
    }

    #[test]
    fn batch_skips_failing_files() {
        let dir = tempfile::tempdir().unwrap();
        let shapes = write(dir.path(), "shapes.spool", "namespace geo class Square { var side: Int32 = 1 }");
        let app = write(dir.path(), "app.spool", "use geo.Square main { var s: Square = new Square() }");
        let bad = write(dir.path(), "bad.spool", "main { var x: Int32 = missing }");

        let task = CompileTask { inputs: vec![shapes, app, bad], ..CompileTask::default() };
        assert_eq!(execute(Command::Compile(task)).unwrap(), 1);

        assert!(dir.path().join("shapes.spb").exists());
        assert!(dir.path().join("app.spb").exists());
        assert!(!dir.path().join("bad.spb").exists());

        let bytes = fs::read(dir.path().join("app.spb")).unwrap();
        assert!(bytes.starts_with(b"#main("));
    }

    #[test]
    fn out_dir_and_disasm_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("build");
        let src = write(dir.path(), "hello.spool", "main { new Console().println(\"hello\") }");

        let task = CompileTask { inputs: vec![src], out_dir: Some(out.clone()), ..CompileTask::default() };
        assert_eq!(execute(Command::Compile(task)).unwrap(), 0);

        let listing = out.join("hello.dis");
        let task = DisasmTask { input: out.join("hello.spb"), output: Output::Path(listing.clone()) };
        assert_eq!(execute(Command::Disasm(task)).unwrap(), 0);
        let text = fs::read_to_string(listing).unwrap();
        assert!(text.contains("== main main()"));
        assert!(text.contains("\"hello\""));
    }

    #[test]
    fn ast_emit_lists_declarations() {
        let dir = tempfile::tempdir().unwrap();
        let src = write(dir.path(), "p.spool", "namespace demo class Point { var x: Int32 = 0 }");
        let task = CompileTask {
            inputs: vec![src],
            out_dir: Some(dir.path().to_path_buf()),
            emit: Emit::Ast,
            ..CompileTask::default()
        };
        assert_eq!(execute(Command::Compile(task)).unwrap(), 0);
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("p.ast.json")).unwrap()).unwrap();
        assert_eq!(json["namespace"], "demo");
        assert!(json["declarations"]["demo.Point"].is_object());
    }

    #[test]
    fn strict_mode_fails_on_syntax_errors() {
        let dir = tempfile::tempdir().unwrap();
        let src = write(dir.path(), "s.spool", "class { } main { }");
        let task = CompileTask { inputs: vec![src], strict: true, ..CompileTask::default() };
        assert_eq!(execute(Command::Compile(task)).unwrap(), 1);
        assert!(!dir.path().join("s.spb").exists());
    }

    #[test]
    fn disasm_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let p = write(dir.path(), "junk.spb", "not bytecode");
        assert!(execute(Command::Disasm(DisasmTask { input: p, output: Output::Stdout })).is_err());
    }

    #[test]
    fn output_names() {
        assert_eq!(output_name(Path::new("src/main.spool"), BYTECODE_EXT), "main.spb");
        assert_eq!(output_name(Path::new("lib"), "dis"), "lib.dis");
    }

    #[test]
    fn missing_inputs_is_an_error() {
        assert!(execute(Command::Compile(CompileTask::default())).is_err());
    }
}
