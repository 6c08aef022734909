use std::collections::HashMap;

/// Rows of a right-hand table grouped by join key, each group in table order.
/// Rows with a blank key are left out: a blank cell is a null key.
pub struct Index<'a, R> {
    groups: HashMap<&'a str, Vec<&'a R>>,
}

impl<'a, R> Index<'a, R> {
    pub fn build(rows: &'a [R], key: impl Fn(&'a R) -> &'a str) -> Self {
        let mut groups: HashMap<&'a str, Vec<&'a R>> = HashMap::new();
        for row in rows {
            let k = key(row);
            if !is_null_key(k) {
                groups.entry(k).or_default().push(row);
            }
        }
        Self { groups }
    }

    /// Matching rows for a key; a null or blank key matches nothing.
    pub fn matches(&self, key: Option<&str>) -> &[&'a R] {
        key.filter(|k| !is_null_key(k))
            .and_then(|k| self.groups.get(k))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn is_null_key(key: &str) -> bool {
    key.trim().is_empty()
}

/// Left outer join. Every left row appears once per matching right row, in
/// right-table order, or once paired with `None` when nothing matches. Left
/// order is preserved.
pub fn left_join<'a, L, R, I>(
    left: I,
    right: &Index<'a, R>,
    key: impl Fn(&L) -> Option<&str>,
) -> Vec<(L, Option<&'a R>)>
where
    L: Clone,
    I: IntoIterator<Item = L>,
{
    let mut out = Vec::new();
    for row in left {
        let hits = right.matches(key(&row));
        match hits.split_last() {
            None => out.push((row, None)),
            Some((last, rest)) => {
                for hit in rest {
                    out.push((row.clone(), Some(*hit)));
                }
                out.push((row, Some(*last)));
            }
        }
    }
    out
}
