use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Root server consulted for TLDs missing from the table below.
pub const IANA_WHOIS_SERVER: &str = "whois.iana.org";

static WHOIS_SERVERS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        // Generic
        ("com", "whois.verisign-grs.com"),
        ("net", "whois.verisign-grs.com"),
        ("org", "whois.pir.org"),
        ("info", "whois.afilias.net"),
        ("biz", "whois.biz"),
        ("name", "whois.nic.name"),
        ("pro", "whois.registrypro.pro"),
        ("edu", "whois.educause.edu"),
        ("app", "whois.nic.google"),
        ("dev", "whois.nic.google"),
        ("page", "whois.nic.google"),
        ("io", "whois.nic.io"),
        ("co", "whois.nic.co"),
        ("me", "whois.nic.me"),
        ("tv", "whois.nic.tv"),
        ("cc", "ccwhois.verisign-grs.com"),
        ("xyz", "whois.nic.xyz"),
        ("online", "whois.nic.online"),
        ("site", "whois.nic.site"),
        ("tech", "whois.nic.tech"),
        ("store", "whois.nic.store"),
        ("shop", "whois.nic.shop"),
        ("cloud", "whois.nic.cloud"),
        ("ai", "whois.nic.ai"),
        // CIS registries
        ("ru", "whois.tcinet.ru"),
        ("su", "whois.tcinet.ru"),
        ("xn--p1ai", "whois.tcinet.ru"),
        ("ua", "whois.ua"),
        ("by", "whois.cctld.by"),
        ("kz", "whois.nic.kz"),
        ("uz", "whois.cctld.uz"),
        ("am", "whois.amnic.net"),
        ("ge", "whois.nic.ge"),
        ("md", "whois.nic.md"),
        // Europe
        ("uk", "whois.nic.uk"),
        ("de", "whois.denic.de"),
        ("fr", "whois.nic.fr"),
        ("nl", "whois.domain-registry.nl"),
        ("eu", "whois.eu"),
        ("it", "whois.nic.it"),
        ("es", "whois.nic.es"),
        ("pl", "whois.dns.pl"),
        ("se", "whois.iis.se"),
        ("fi", "whois.fi"),
        ("ch", "whois.nic.ch"),
        ("at", "whois.nic.at"),
        ("cz", "whois.nic.cz"),
        ("lv", "whois.nic.lv"),
        ("lt", "whois.domreg.lt"),
        ("ee", "whois.tld.ee"),
        // Elsewhere
        ("us", "whois.nic.us"),
        ("ca", "whois.cira.ca"),
        ("au", "whois.auda.org.au"),
        ("jp", "whois.jprs.jp"),
        ("cn", "whois.cnnic.cn"),
        ("in", "whois.registry.in"),
        ("br", "whois.registro.br"),
    ]
    .into_iter()
    .collect()
});

pub fn get_whois_server(tld: &str) -> Option<&'static str> {
    WHOIS_SERVERS.get(tld.to_lowercase().as_str()).copied()
}

/// Registration-data endpoint for a TLD: `.ru` has its own registry
/// endpoint, everything else goes through the rdap.org redirector.
pub fn rdap_base_for(tld: &str) -> &'static str {
    match tld.to_lowercase().as_str() {
        "ru" => "https://rdap.tcinet.ru/",
        _ => "https://rdap.org/",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_servers() {
        assert_eq!(get_whois_server("com"), Some("whois.verisign-grs.com"));
        assert_eq!(get_whois_server("RU"), Some("whois.tcinet.ru"));
        assert_eq!(get_whois_server("invalidtld"), None);
    }

    #[test]
    fn test_punycode_tld_reaches_server() {
        let domain = crate::validation::normalize_domain("xn--d1acufc.xn--p1ai").unwrap();
        let tld = crate::validation::tld_of(&domain).unwrap();
        assert_eq!(get_whois_server(tld), Some("whois.tcinet.ru"));
    }

    #[test]
    fn test_rdap_endpoint_selection() {
        assert_eq!(rdap_base_for("ru"), "https://rdap.tcinet.ru/");
        assert_eq!(rdap_base_for("com"), "https://rdap.org/");
        assert_eq!(rdap_base_for("su"), "https://rdap.org/");
    }
}
