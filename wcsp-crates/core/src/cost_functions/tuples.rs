/// Enumerates, in lexicographic order, the tuples of a scope in which every position ranges over
/// its own list of values.
///
/// Fixed positions are given a list with a single value.
#[derive(Debug, Clone)]
pub(crate) struct Completions {
    domains: Vec<Vec<usize>>,
    cursors: Vec<usize>,
    tuple: Vec<usize>,
    started: bool,
    exhausted: bool,
}

impl Completions {
    pub(crate) fn new(domains: Vec<Vec<usize>>) -> Self {
        let exhausted = domains.iter().any(Vec::is_empty);
        let tuple = domains
            .iter()
            .map(|domain| domain.first().copied().unwrap_or_default())
            .collect();
        Completions {
            cursors: vec![0; domains.len()],
            domains,
            tuple,
            started: false,
            exhausted,
        }
    }

    /// Every tuple over `0..size` for each of the `sizes`.
    pub(crate) fn over_initial_domains(sizes: &[usize]) -> Self {
        Self::new(sizes.iter().map(|&size| (0..size).collect()).collect())
    }

    pub(crate) fn next_tuple(&mut self) -> Option<&[usize]> {
        if self.exhausted {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(&self.tuple);
        }

        for position in (0..self.domains.len()).rev() {
            if self.cursors[position] + 1 < self.domains[position].len() {
                self.cursors[position] += 1;
                self.tuple[position] = self.domains[position][self.cursors[position]];
                return Some(&self.tuple);
            }
            self.cursors[position] = 0;
            self.tuple[position] = self.domains[position][0];
        }

        self.exhausted = true;
        None
    }
}
