pub use crate::config::*;

/// A ballot with one checkbox per candidate.
///
/// The candidates are kept in display order, and the selections are always
/// returned in that order, whatever the order in which the boxes were checked.
///
/// ```
/// pub use exit_poll::ballot::Ballot;
/// # use exit_poll::SessionError;
///
/// let mut ballot = Ballot::new(&["Anna Rossi".to_string(), "Bruno Verdi".to_string()]);
///
/// ballot.toggle(1)?;
/// ballot.check_name("Anna Rossi")?;
/// assert_eq!(ballot.selections(), vec!["Anna Rossi".to_string(), "Bruno Verdi".to_string()]);
///
/// # Ok::<(), SessionError>(())
/// ```
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Ballot {
    candidates: Vec<String>,
    checked: Vec<bool>,
}

impl Ballot {
    pub fn new(candidates: &[String]) -> Ballot {
        Ballot {
            candidates: candidates.to_vec(),
            checked: vec![false; candidates.len()],
        }
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn is_checked(&self, idx: usize) -> bool {
        self.checked.get(idx).cloned().unwrap_or(false)
    }

    /// Flips the checkbox of the candidate at position `idx` (starting at 0).
    pub fn toggle(&mut self, idx: usize) -> Result<(), SessionError> {
        let current = self.is_checked(idx);
        self.set(idx, !current)
    }

    pub fn set(&mut self, idx: usize, value: bool) -> Result<(), SessionError> {
        match self.checked.get_mut(idx) {
            Some(flag) => {
                *flag = value;
                Ok(())
            }
            None => Err(SessionError::UnknownCandidate(format!(
                "#{}",
                idx.saturating_add(1)
            ))),
        }
    }

    /// Checks a candidate by display name.
    ///
    /// Names are not unique: the first unchecked entry with that name is
    /// checked. Checking a name with all its entries already checked is a no-op.
    pub fn check_name(&mut self, name: &str) -> Result<(), SessionError> {
        let positions: Vec<usize> = self
            .candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.as_str() == name)
            .map(|(idx, _)| idx)
            .collect();
        if positions.is_empty() {
            return Err(SessionError::UnknownCandidate(name.to_string()));
        }
        if let Some(idx) = positions.iter().find(|idx| !self.checked[**idx]) {
            self.checked[*idx] = true;
        }
        Ok(())
    }

    pub fn count_checked(&self) -> usize {
        self.checked.iter().filter(|b| **b).count()
    }

    /// The names of the checked candidates, in display order.
    pub fn selections(&self) -> Vec<String> {
        self.candidates
            .iter()
            .zip(self.checked.iter())
            .filter(|(_, checked)| **checked)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Unchecks everything.
    pub fn clear(&mut self) {
        for flag in self.checked.iter_mut() {
            *flag = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        ["Anna Rossi", "Bruno Verdi", "Carla Bianchi"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn selections_follow_display_order() {
        let mut b = Ballot::new(&names());
        b.toggle(2).unwrap();
        b.toggle(0).unwrap();
        assert_eq!(
            b.selections(),
            vec!["Anna Rossi".to_string(), "Carla Bianchi".to_string()]
        );
        assert_eq!(b.count_checked(), 2);
    }

    #[test]
    fn toggle_twice_unchecks() {
        let mut b = Ballot::new(&names());
        b.toggle(1).unwrap();
        b.toggle(1).unwrap();
        assert!(!b.is_checked(1));
        assert!(b.selections().is_empty());
    }

    #[test]
    fn out_of_range() {
        let mut b = Ballot::new(&names());
        assert_eq!(
            b.toggle(3),
            Err(SessionError::UnknownCandidate("#4".to_string()))
        );
        assert!(!b.is_checked(3));
        assert_eq!(
            b.toggle(usize::MAX),
            Err(SessionError::UnknownCandidate(format!("#{}", usize::MAX)))
        );
    }

    #[test]
    fn duplicate_names() {
        let mut b = Ballot::new(&["Anna".to_string(), "Anna".to_string()]);
        b.check_name("Anna").unwrap();
        assert!(b.is_checked(0));
        assert!(!b.is_checked(1));
        b.check_name("Anna").unwrap();
        assert!(b.is_checked(1));
        assert!(b.check_name("Bruno").is_err());
    }

    #[test]
    fn clear_unchecks_everything() {
        let mut b = Ballot::new(&names());
        b.set(0, true).unwrap();
        b.set(2, true).unwrap();
        b.clear();
        assert_eq!(b.count_checked(), 0);
        assert!((0..3).all(|i| !b.is_checked(i)));
    }
}
