//! Portées de la génération : noms → emplacements locaux à plat.
//!
//! L’emplacement `i` d’une portée vaut `i + Σ(taille des portées ancêtres)`.
//! Une portée de boucle porte ses points de saut de début et de fin ; `next`
//! et `break` remontent jusqu’à la boucle la plus proche.

#[derive(Debug, Default)]
struct Frame {
    names: Vec<String>,
    /// `(début, fin)` dans la table des sauts.
    loop_points: Option<(u16, u16)>,
}

/// Pile de portées d’un chunk.
#[derive(Debug)]
pub struct Scope {
    frames: Vec<Frame>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    /// Pile avec une portée racine vide.
    pub fn new() -> Self {
        Self { frames: vec![Frame::default()] }
    }

    /// Portée enfant.
    pub fn push(&mut self) {
        self.frames.push(Frame::default());
    }

    /// Portée enfant de boucle.
    pub fn push_loop(&mut self, start: u16, end: u16) {
        self.frames.push(Frame { names: Vec::new(), loop_points: Some((start, end)) });
    }

    /// Quitte la portée courante et renvoie sa taille.
    pub fn pop(&mut self) -> usize {
        if self.frames.len() > 1 {
            self.frames.pop().map_or(0, |f| f.names.len())
        } else {
            0
        }
    }

    /// Nombre de noms de la portée courante.
    pub fn size(&self) -> usize {
        self.frames.last().map_or(0, |f| f.names.len())
    }

    /// Déclare dans la portée courante ; `false` si le nom y existe déjà.
    pub fn declare(&mut self, name: &str) -> bool {
        let Some(frame) = self.frames.last_mut() else {
            return false;
        };
        if frame.names.iter().any(|n| n == name) {
            return false;
        }
        frame.names.push(name.to_owned());
        true
    }

    /// Emplacement à plat du nom le plus interne.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.frames.iter().enumerate().rev().find_map(|(depth, frame)| {
            let pos = frame.names.iter().position(|n| n == name)?;
            let base: usize = self.frames[..depth].iter().map(|f| f.names.len()).sum();
            Some(base + pos)
        })
    }

    /// Points `(début, fin)` de la boucle englobante.
    pub fn loop_points(&self) -> Option<(u16, u16)> {
        self.frames.iter().rev().find_map(|f| f.loop_points)
    }
}
