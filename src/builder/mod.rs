//! Declarative builders for content prototypes.
//!
//! Every kind shares one builder shape. A [`Builder`] is a handle onto a
//! shared table of prototypes plus a *scope*: the set of prototypes that
//! field setters apply to. Setters also record onto the builder's template,
//! so prototypes created later through [`Builder::new`] start from the
//! values set so far.
//!
//! ```text
//! let base = ctx.structures().child().layer(2).shape(Shape::solid(1, 1, 2));
//! base.new("cabinets").image(cabinets);
//! let shelves = base.prefixed("bookshelf");
//! shelves.new("0").image(shelf0);   // named "bookshelf/0", layer 2
//! ```
//!
//! Builders never read prototypes back. Required fields and cross
//! references are checked when prototypes are instantiated into frozen
//! definitions, which happens only after every declaration module ran.

mod block;
mod extra;
mod item;
mod loot;
mod recipe;
mod sprite;
mod structure;

pub use block::BlockProto;
pub use extra::ExtraProto;
pub use item::ItemProto;
pub use loot::LootTableProto;
pub use recipe::RecipeProto;
pub use sprite::SpriteProto;
pub use structure::{PartProto, StructureProto};

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::error::{DataError, Result};
use crate::image::ImageStore;
use crate::registry::Defs;

/// Everything an instantiating prototype may consult.
pub struct Instantiate<'a> {
    pub images: &'a mut ImageStore,
    pub items: &'a BTreeMap<String, ItemProto>,
    pub structures: &'a BTreeMap<String, StructureProto>,
    /// Item descriptions merged from `item_descs.yaml` files.
    pub descs: &'a BTreeMap<String, String>,
}

/// A partially specified definition of one kind.
pub trait Prototype: Clone + Default + fmt::Debug {
    /// Kind name used in diagnostics.
    const KIND: &'static str;
    type Def;

    /// Check required fields and build the frozen definition.
    fn instantiate(&self, name: &str, cx: &mut Instantiate<'_>) -> Result<Self::Def>;
}

type Table<P> = Rc<RefCell<BTreeMap<String, P>>>;
type Scope = Rc<RefCell<Vec<String>>>;

/// Handle onto a scope of prototypes.
#[derive(Clone)]
pub struct Builder<P: Prototype> {
    protos: Table<P>,
    prefix: Option<String>,
    template: P,
    /// Own scope last; new prototypes join every scope in the chain.
    scopes: Vec<Scope>,
}

impl<P: Prototype> fmt::Debug for Builder<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("kind", &P::KIND)
            .field("prefix", &self.prefix)
            .field("names", &self.names())
            .finish()
    }
}

impl<P: Prototype> Default for Builder<P> {
    fn default() -> Self {
        Self::root()
    }
}

impl<P: Prototype> Builder<P> {
    /// A fresh table with a single scope covering every prototype.
    pub fn root() -> Self {
        Self {
            protos: Rc::new(RefCell::new(BTreeMap::new())),
            prefix: None,
            template: P::default(),
            scopes: vec![Rc::new(RefCell::new(Vec::new()))],
        }
    }

    fn own_scope(&self) -> Option<&Scope> {
        self.scopes.last()
    }

    fn full_name(&self, name: &str) -> String {
        match &self.prefix {
            Some(p) => format!("{}/{}", p, name),
            None => name.to_string(),
        }
    }

    /// An empty scope nested in this one, starting from this template.
    pub fn child(&self) -> Self {
        let mut scopes = self.scopes.clone();
        scopes.push(Rc::new(RefCell::new(Vec::new())));
        Self {
            protos: Rc::clone(&self.protos),
            prefix: self.prefix.clone(),
            template: self.template.clone(),
            scopes,
        }
    }

    /// Like [`child`](Self::child), with names of new prototypes prefixed
    /// by `p/`.
    pub fn prefixed(&self, p: &str) -> Self {
        let mut b = self.child();
        b.prefix = Some(self.full_name(p));
        b
    }

    /// Add a prototype named `name` (under this builder's prefix) built from
    /// the current template. Returns a builder scoped to just that
    /// prototype.
    #[allow(clippy::new_ret_no_self, clippy::should_implement_trait)]
    pub fn new(&self, name: &str) -> Self {
        let full = self.full_name(name);
        self.insert(full, self.template.clone())
    }

    pub(crate) fn insert(&self, full: String, proto: P) -> Self {
        if self
            .protos
            .borrow_mut()
            .insert(full.clone(), proto.clone())
            .is_some()
        {
            debug!("{} `{}` redeclared, keeping the later declaration", P::KIND, full);
        }
        for scope in &self.scopes {
            let mut s = scope.borrow_mut();
            if !s.contains(&full) {
                s.push(full.clone());
            }
        }
        let mut scopes = self.scopes.clone();
        scopes.push(Rc::new(RefCell::new(vec![full])));
        Self {
            protos: Rc::clone(&self.protos),
            prefix: self.prefix.clone(),
            template: proto,
            scopes,
        }
    }

    /// A builder scoped to the member `key` of this builder's prefix.
    pub fn get(&self, key: &str) -> Self {
        let full = self.full_name(key);
        let template = self
            .protos
            .borrow()
            .get(&full)
            .cloned()
            .unwrap_or_else(|| self.template.clone());
        let mut scopes = self.scopes.clone();
        scopes.push(Rc::new(RefCell::new(vec![full])));
        Self {
            protos: Rc::clone(&self.protos),
            prefix: self.prefix.clone(),
            template,
            scopes,
        }
    }

    /// Full names of the prototypes in scope, in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.own_scope()
            .map(|s| s.borrow().clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.own_scope().map_or(0, |s| s.borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply `f` to the template and every prototype in scope.
    pub fn modify(mut self, f: impl Fn(&mut P)) -> Self {
        f(&mut self.template);
        let names = self.names();
        let mut protos = self.protos.borrow_mut();
        for name in &names {
            if let Some(p) = protos.get_mut(name) {
                f(p);
            }
        }
        drop(protos);
        self
    }

    /// Snapshot of every prototype in the table.
    pub fn all(&self) -> BTreeMap<String, P> {
        self.protos.borrow().clone()
    }

    /// Instantiate every prototype in the table in name order. Failures are
    /// collected rather than stopping at the first one.
    pub fn instantiate_all(&self, cx: &mut Instantiate<'_>) -> (Vec<P::Def>, Vec<DataError>) {
        let protos = self.all();
        let mut defs = Vec::with_capacity(protos.len());
        let mut errors = Vec::new();
        for (name, p) in &protos {
            match p.instantiate(name, cx) {
                Ok(d) => defs.push(d),
                Err(e) => errors.push(e),
            }
        }
        (defs, errors)
    }
}

/// The root builder of every kind. Declaration modules add to these.
#[derive(Debug, Clone, Default)]
pub struct Builders {
    pub blocks: Builder<BlockProto>,
    pub items: Builder<ItemProto>,
    pub recipes: Builder<RecipeProto>,
    pub structures: Builder<StructureProto>,
    pub sprites: Builder<SpriteProto>,
    pub loot_tables: Builder<LootTableProto>,
    pub extras: Builder<ExtraProto>,
}

impl Builders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiate every prototype. Structures go first so derived item
    /// icons find their images already interned.
    pub fn collect_defs(
        &self,
        images: &mut ImageStore,
        descs: &BTreeMap<String, String>,
    ) -> (Defs, Vec<DataError>) {
        let items = self.items.all();
        let structures = self.structures.all();
        let mut cx = Instantiate {
            images,
            items: &items,
            structures: &structures,
            descs,
        };
        let mut errors = Vec::new();
        let defs = Defs {
            structures: take(&mut errors, self.structures.instantiate_all(&mut cx)),
            blocks: take(&mut errors, self.blocks.instantiate_all(&mut cx)),
            items: take(&mut errors, self.items.instantiate_all(&mut cx)),
            recipes: take(&mut errors, self.recipes.instantiate_all(&mut cx)),
            sprites: take(&mut errors, self.sprites.instantiate_all(&mut cx)),
            loot_tables: take(&mut errors, self.loot_tables.instantiate_all(&mut cx)),
            extras: take(&mut errors, self.extras.instantiate_all(&mut cx)),
        };
        debug!(
            "instantiated {} structures, {} blocks, {} items, {} recipes, {} sprites",
            defs.structures.len(),
            defs.blocks.len(),
            defs.items.len(),
            defs.recipes.len(),
            defs.sprites.len()
        );
        (defs, errors)
    }
}

fn take<T>(errors: &mut Vec<DataError>, (defs, errs): (Vec<T>, Vec<DataError>)) -> Vec<T> {
    errors.extend(errs);
    defs
}

/// Error for a required field that was never set.
pub(crate) fn missing(name: &str, field: &str) -> DataError {
    DataError::config(name, field, "is required")
}


#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Thing {
        colour: Option<String>,
        size: u32,
    }

    impl Prototype for Thing {
        const KIND: &'static str = "thing";
        type Def = (String, String, u32);

        fn instantiate(&self, name: &str, _cx: &mut Instantiate<'_>) -> Result<Self::Def> {
            let colour = self.colour.clone().ok_or_else(|| missing(name, "colour"))?;
            Ok((name.to_string(), colour, self.size))
        }
    }

    impl Builder<Thing> {
        fn colour(self, c: &str) -> Self {
            self.modify(|t| t.colour = Some(c.to_string()))
        }

        fn size(self, n: u32) -> Self {
            self.modify(|t| t.size = n)
        }
    }

    fn instantiate(b: &Builder<Thing>) -> (Vec<(String, String, u32)>, Vec<DataError>) {
        tests_support::with_cx(|cx| b.instantiate_all(cx))
    }

    #[test]
    fn test_template_applies_to_later_members() {
        let root = Builder::<Thing>::root();
        let b = root.child().size(3);
        b.new("a").colour("red");
        let (defs, errors) = instantiate(&root);
        assert!(errors.is_empty());
        assert_eq!(defs, vec![("a".to_string(), "red".to_string(), 3)]);
    }

    #[test]
    fn test_setters_apply_to_every_member_in_scope() {
        let root = Builder::<Thing>::root();
        let b = root.prefixed("fence");
        b.new("post");
        b.new("gate");
        let b = b.colour("brown");
        assert_eq!(b.names(), vec!["fence/post", "fence/gate"]);
        let (defs, _) = instantiate(&root);
        assert!(defs.iter().all(|d| d.1 == "brown"));
        assert_eq!(root.len(), 2);
    }

    #[test]
    fn test_sibling_scopes_are_independent() {
        let root = Builder::<Thing>::root();
        let a = root.child();
        a.new("x");
        let b = root.child();
        b.new("y");
        b.colour("blue");
        a.colour("green");
        let (defs, _) = instantiate(&root);
        assert_eq!(defs[0], ("x".to_string(), "green".to_string(), 0));
        assert_eq!(defs[1], ("y".to_string(), "blue".to_string(), 0));
    }

    #[test]
    fn test_get_scopes_one_member() {
        let root = Builder::<Thing>::root();
        let s = root.prefixed("statue").colour("grey");
        s.new("n");
        s.new("e");
        s.get("e").size(9);
        let (defs, _) = instantiate(&root);
        let e = defs.iter().find(|d| d.0 == "statue/e").unwrap();
        let n = defs.iter().find(|d| d.0 == "statue/n").unwrap();
        assert_eq!(e.2, 9);
        assert_eq!(n.2, 0);
    }

    #[test]
    fn test_missing_fields_are_collected() {
        let root = Builder::<Thing>::root();
        root.new("a");
        root.new("b").colour("red");
        root.new("c");
        let (defs, errors) = instantiate(&root);
        assert_eq!(defs.len(), 1);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].to_string().contains("a"));
        assert_eq!(errors[0].code(), "outpost::config");
    }
}
