/// S&P 600 small-cap tickers screened when no symbols are given.
pub const DEFAULT_UNIVERSE: [&str; 20] = [
    "AAON", "AATI", "ABCB", "ABG", "ABM", "ACLS", "ADTN", "AEIS", "AEL", "AF", "AGYS", "AJRD",
    "AKS", "ALEX", "AM", "AMED", "AMPH", "AMSF", "AMWD", "ANIK",
];

pub fn default_universe() -> Vec<String> {
    DEFAULT_UNIVERSE.iter().map(|symbol| (*symbol).to_owned()).collect()
}
