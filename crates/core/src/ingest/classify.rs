// Name fragments of companies under government control. Heuristic only: new listings will be
// missed until added here.
const STATE_OWNED_NAME_KEYWORDS: &[&str] = &[
    "petrobras",
    "banco do brasil",
    "eletrobras",
    "caixa",
    "correios",
    "sabesp",
    "copel",
    "cemig",
    "telebras",
    "banrisul",
    "sanepar",
    "copasa",
    "casan",
    "banco do nordeste",
    "banco da amazonia",
];

const STATE_OWNED_TICKERS: &[&str] = &[
    "PETR3", "PETR4", "BBAS3", "ELET3", "ELET5", "ELET6", "SBSP3", "CPLE3", "CPLE5", "CPLE6",
    "CMIG3", "CMIG4", "TELB3", "TELB4", "BRSR3", "BRSR5", "BRSR6", "SAPR3", "SAPR4", "SAPR11",
    "CSMG3", "BNBR3", "BAZA3", "CASN3", "CASN4", "CEEB3", "CEBR3", "CEBR5", "CEBR6",
];

/// Whether the company is flagged as state-owned, by name keyword or by known ticker.
pub fn is_state_owned(name: &str, ticker: &str) -> bool {
    let name = name.to_lowercase();
    if STATE_OWNED_NAME_KEYWORDS.iter().any(|k| name.contains(k)) {
        return true;
    }

    let ticker = ticker.trim();
    STATE_OWNED_TICKERS
        .iter()
        .any(|t| t.eq_ignore_ascii_case(ticker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_by_name_or_ticker() {
        assert!(is_state_owned("Petrobras", "PETR4"));
        assert!(is_state_owned("BANCO DO BRASIL S.A.", "XXXX3"));
        assert!(is_state_owned("CMIG4", "CMIG4"));
        assert!(is_state_owned("sanepar", "ZZZZ11"));
    }

    #[test]
    fn private_companies_are_not_flagged() {
        assert!(!is_state_owned("Weg S.A.", "WEGE3"));
        assert!(!is_state_owned("Itau Unibanco", "ITUB4"));
        assert!(!is_state_owned("VALE3", "VALE3"));
    }
}
