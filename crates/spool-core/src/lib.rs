//! spool-core : primitives partagées du compilateur Spool
//!
//! Fournit :
//! - `SourceId`, `Pos`, `Span` (offsets des jetons)
//! - IO mémoire (little-endian) : `ByteWriter`, `ByteReader`
//! - Erreurs `CoreError` + alias `CoreResult<T>`
//! - le module [`bytecode`] : opcodes, `Chunk`/`Clazz`, format filaire hybride
//!   (en-tête texte + corps binaire), lecteur, validation et désassembleur.
//!
//! Features :
//! - `serde` : derive `Serialize` sur les structures utiles

#![deny(missing_docs)]

/* ─────────────────────────── Imports ─────────────────────────── */

use std::borrow::Cow;

#[cfg(feature = "serde")]
use serde::Serialize;

/* ─────────────────────────── Modules publics ─────────────────────────── */

/// Bytecode Spool (instructions, chunks, classes, format filaire).
pub mod bytecode;

/// Ré-exporte les helpers de validation.
pub use bytecode::helpers;
/// Ré-exporte le désassembleur textuel.
pub use bytecode::disasm;

/* ─────────────────────────── Résultat commun ─────────────────────────── */

/// Alias résultat commun au core.
pub type CoreResult<T> = Result<T, CoreError>;

/* ─────────────────────────── Spans / Positions ─────────────────────────── */

/// Identifiant de source (fichier, buffer, etc.).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct SourceId(pub u32);

/// Position (offset byte) depuis le début de la source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Pos(pub u32);

/// Plage (demi-ouverte) `[start, end)` dans une source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Span {
    /// Source d’où provient l’item.
    pub source: SourceId,
    /// Début inclus.
    pub start: Pos,
    /// Fin exclue.
    pub end: Pos,
}

impl Span {
    /// Crée un span.
    pub const fn new(source: SourceId, start: Pos, end: Pos) -> Self { Self { source, start, end } }
}

/* ─────────────────────────── Byte Writer (LE) ─────────────────────────── */

/// Buffer d’écriture (croît automatiquement).
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    /// Crée un writer vide.
    pub const fn new() -> Self { Self { buf: Vec::new() } }
    /// Accès en lecture au contenu.
    pub fn as_slice(&self) -> &[u8] { &self.buf }
    /// Taille courante.
    pub fn len(&self) -> usize { self.buf.len() }
    /// Vrai si rien n’a été écrit.
    pub fn is_empty(&self) -> bool { self.buf.is_empty() }
    /// Récupère le buffer (consomme).
    pub fn into_vec(self) -> Vec<u8> { self.buf }
    /// Ajoute des octets bruts.
    pub fn write_bytes(&mut self, bytes: &[u8]) { self.buf.extend_from_slice(bytes); }
    /// Ajoute du texte (en-têtes ASCII du format filaire).
    pub fn write_str(&mut self, s: &str) { self.buf.extend_from_slice(s.as_bytes()); }
    /// Écrit un octet.
    pub fn write_u8(&mut self, v: u8) { self.buf.push(v); }
    /// Écrit un booléen sur un octet (1/0).
    pub fn write_bool(&mut self, v: bool) { self.buf.push(u8::from(v)); }
    /// Écrit un u16 little-endian (octet bas puis octet haut).
    pub fn write_u16_le(&mut self, v: u16) { self.buf.extend_from_slice(&v.to_le_bytes()); }
}

/* ─────────────────────────── Byte Reader (LE) ─────────────────────────── */

/// Lecteur séquentiel sur un slice d’octets (helpers LE).
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    off: usize,
}

impl<'a> ByteReader<'a> {
    /// Construit un lecteur.
    pub const fn new(data: &'a [u8]) -> Self { Self { data, off: 0 } }
    /// Offset courant.
    pub const fn offset(&self) -> usize { self.off }
    /// Taille restante.
    pub const fn remaining(&self) -> usize { self.data.len().saturating_sub(self.off) }
    /// Vrai si tout a été consommé.
    pub const fn is_empty(&self) -> bool { self.remaining() == 0 }

    /// Vrai si les octets restants commencent par `prefix`.
    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.data.get(self.off..).is_some_and(|rest| rest.starts_with(prefix))
    }

    /// Lit `n` octets (ou erreur si EOF).
    pub fn read_bytes(&mut self, n: usize) -> CoreResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(CoreError::UnexpectedEof { needed: n as u64, at: self.off as u64 });
        }
        let start = self.off;
        self.off += n;
        Ok(&self.data[start..self.off])
    }

    /// Consomme `prefix` s’il est présent.
    pub fn eat(&mut self, prefix: &[u8]) -> bool {
        if self.starts_with(prefix) {
            self.off += prefix.len();
            true
        } else {
            false
        }
    }

    /// Lit un octet.
    pub fn read_u8(&mut self) -> CoreResult<u8> { Ok(self.read_bytes(1)?[0]) }

    /// Lit un booléen codé sur un octet.
    pub fn read_bool(&mut self) -> CoreResult<bool> {
        let at = self.off;
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CoreError::corrupted(format!("invalid bool byte {other} at {at}"))),
        }
    }

    /// Lit un u16 LE.
    pub fn read_u16_le(&mut self) -> CoreResult<u16> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }
}

/* ─────────────────────────── Erreurs ─────────────────────────── */

/// Erreurs de bas niveau communes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// Fin de buffer inattendue.
    #[error("unexpected EOF: need {needed} bytes at {at}")]
    UnexpectedEof {
        /// Nombre d’octets manquants.
        needed: u64,
        /// Offset où l’erreur s’est produite.
        at: u64,
    },
    /// UTF-8 invalide dans un en-tête.
    #[error("invalid utf-8 at {at}")]
    InvalidUtf8 {
        /// Offset du champ fautif.
        at: u64,
    },
    /// Données corrompues (format).
    #[error("corrupted: {0}")]
    Corrupted(Cow<'static, str>),
}

impl CoreError {
    /// Construit une erreur « corrompu ».
    pub fn corrupted(msg: impl Into<Cow<'static, str>>) -> Self { Self::Corrupted(msg.into()) }
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_reader_le() -> CoreResult<()> {
        let mut w = ByteWriter::new();
        w.write_u16_le(0xBEEF);
        w.write_bool(true);
        w.write_str("#main(");

        let mut r = ByteReader::new(w.as_slice());
        assert_eq!(r.read_u16_le()?, 0xBEEF);
        assert!(r.read_bool()?);
        assert!(r.eat(b"#main("));
        assert!(r.is_empty());
        Ok(())
    }

    #[test]
    fn u16_is_low_byte_first() {
        let mut w = ByteWriter::new();
        w.write_u16_le(0x0102);
        assert_eq!(w.as_slice(), &[0x02, 0x01]);
    }

    #[test]
    fn reader_reports_eof_offset() {
        let mut r = ByteReader::new(&[1]);
        assert_eq!(r.read_u16_le(), Err(CoreError::UnexpectedEof { needed: 2, at: 0 }));
    }

    #[test]
    fn bad_bool_is_corrupted() {
        let mut r = ByteReader::new(&[7]);
        assert!(matches!(r.read_bool(), Err(CoreError::Corrupted(_))));
    }
}
