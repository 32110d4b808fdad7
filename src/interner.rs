// ABOUTME: Thread-local interner for symbol and keyword names

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::thread::LocalKey;

thread_local! {
    static SYMBOLS: RefCell<HashSet<Rc<str>>> = RefCell::new(HashSet::new());
    static KEYWORDS: RefCell<HashSet<Rc<str>>> = RefCell::new(HashSet::new());
}

fn intern_in(table: &LocalKey<RefCell<HashSet<Rc<str>>>>, name: &str) -> Rc<str> {
    table.with(|set| {
        let mut set = set.borrow_mut();
        if let Some(existing) = set.get(name) {
            return Rc::clone(existing);
        }
        let rc: Rc<str> = Rc::from(name);
        set.insert(Rc::clone(&rc));
        rc
    })
}

/// Interns a symbol name, returning the canonical `Rc<str>` for it.
pub fn intern_symbol(name: &str) -> Rc<str> {
    intern_in(&SYMBOLS, name)
}

/// Interns a keyword name (without its leading `:`), returning the
/// canonical `Rc<str>` for it.
pub fn intern_keyword(name: &str) -> Rc<str> {
    intern_in(&KEYWORDS, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_interns_to_the_same_allocation() {
        let a = intern_symbol("foo");
        let b = intern_symbol("foo");
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn symbols_and_keywords_are_interned_separately() {
        let s = intern_symbol("bar");
        let k = intern_keyword("bar");
        assert!(!Rc::ptr_eq(&s, &k));
    }
}
