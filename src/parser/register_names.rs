use super::error::ParserError as Error;
use hashbrown::HashMap;

pub type RegMap = HashMap<String, u8>;

/// Conventional names, on top of `r0`..`r31`
pub const ALIASES: [(&str, u8); 10] = [
    ("zero", 0),
    ("at", 1),
    ("et", 24),
    ("bt", 25),
    ("gp", 26),
    ("sp", 27),
    ("fp", 28),
    ("ea", 29),
    ("ba", 30),
    ("ra", 31),
];

pub fn regs() -> RegMap {
    let mut map = RegMap::with_capacity(48);

    for i in 0..32 {
        map.insert(format!("r{}", i), i);
    }

    for (name, i) in ALIASES {
        map.insert(name.to_owned(), i);
    }

    map
}

pub trait TryGetRegister {
    fn try_get(&self, name: &str) -> Result<u8, Error>;
}

impl TryGetRegister for RegMap {
    /// Case-insensitive
    fn try_get(&self, name: &str) -> Result<u8, Error> {
        let name = name.trim();
        self.get(name)
            .or_else(|| self.get(name.to_ascii_lowercase().as_str()))
            .copied()
            .ok_or_else(|| {
                Error::ExpectedRegister((!name.is_empty()).then(|| name.to_owned()))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        let regs = regs();
        assert_eq!(regs.try_get("r0"), Ok(0));
        assert_eq!(regs.try_get("R31"), Ok(31));
        assert_eq!(regs.try_get("sp"), Ok(27));
        assert_eq!(regs.try_get("Ra"), Ok(31));
        assert_eq!(regs.try_get("zero"), Ok(0));
        assert_eq!(
            regs.try_get("r32"),
            Err(Error::ExpectedRegister(Some("r32".into())))
        );
        assert_eq!(regs.try_get(""), Err(Error::ExpectedRegister(None)));
    }
}
