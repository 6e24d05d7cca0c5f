//! OpenPGP verification of the package catalog
//!
//! Only the catalog is signed; every package is pinned by the digest the
//! catalog lists for it, so one detached signature covers the whole run.

use crate::{Error, Result};
use pgp::{Deserializable, SignedPublicKey, StandaloneSignature};
use std::fs;
use std::path::Path;

/// Cygwin's release key, from https://cygwin.com/key/pubring.asc
pub const CYGWIN_PUBRING: &str = "\
-----BEGIN PGP PUBLIC KEY BLOCK-----
Version: GnuPG v1.2.6 (GNU/Linux)

mQGiBEhS+m8RBAC5bn3n2yG0eqNlpg/D7DkZXQfFUBZN1D4sL/NsXKISQkA3FsiT
enDYDMFCy3NJiCDcihJprP2xs4Fc25MEcmJ4j9X93bCV4DtHv22qO1XWGkxr/XQJ
ZxYmUxFhezBOCZd+wXir0izIsGghR1+ei6i+vL4mRYy8wpMCKwf8X0qRywCg1l2J
a91PsTO6itVUACYMvKNFCHED/RenUG+kYRch9YHuDwG9LxkhgwSEZ0NIGUgZLHMY
HZDlcWBRoV6uPcqa2iKs8vvAENMcGWqo+fuRycGQ6+zlFn29IoHrcxMMM27VpifQ
91N5AqgSMPOIFkKse2VNFQ2jL4t1NfdQazRvZojwkXuYY9kB16h0Y2Zme1Pt5RgC
/wLhA/4lkttrs3ElzkAOZtrTwi7tCJnNR8/5VYnVd63NEGyAXk/qralUoQO+GNQf
ZXJUvCoYIhinHh7vzfqMT2l1gGi0FuSULX3dY5jsm0Vcu+f7XLlDoEurx1vDYCv+
9QABQDDPXuZJk55pDG1TQbvAFV8U6wWdCI5hBwcJsDfwLMzxN7QaQ3lnd2luIDxj
eWd3aW5AY3lnd2luLmNvbT6IXgQTEQIAHgUCSFL6bwIbAwYLCQgHAwIDFQIDAxYC
AQIeAQIXgAAKCRCpomL/Z2BBuncZAKCmfQS2ROcl9H8VaKmdMOB/loNRLwCfTqxf
W6L6ifl1uDwoH8t83PRjkRW5AQ0ESFL6cBAEAIqcw0vcqdTvuukm6oiRUxkQ/jrP
+4w2FNKEK1sYG5+cbwVrf3ISTUrbTRbV3Fz5npefwaLNlIUjVYCBBWL4PuUtL4cC
rmbvMXabSYfz2qg/aqqw9xNa4G9GCdF4j9AIZaV86UHElC1wZAHTvMEdgHs8ek9k
b5rDDChUgyE+nXQ7AAMFA/4rXq6swR8m/1O8nRgNkwDvas3DbUOIdoYoFPrN7e2L
BuYWFDB+O2IUn6tAgHhDxpzO9vw58U5a/z1zm63Lf9ybHDV4c3Rqie2u2oberj1K
KStnn27KlGGvFY9kWe9WKh+ZN90/oqVGBT4+obmTiwUmVJIUy4vSZDjC0VqZHLxd
OIhJBBgRAgAJBQJIUvpwAhsMAAoJEKmiYv9nYEG6euAAniloWCmYSp4ULCHauEMb
opO2jFlwAKCwlu0FsfcO/2+AresM67hCSwxQ+g==
=7qzL
-----END PGP PUBLIC KEY BLOCK-----
";

/// Parse an ASCII-armored public key.
pub fn load_public_key(armored: &str) -> Result<SignedPublicKey> {
    let (key, _headers) = SignedPublicKey::from_string(armored)
        .map_err(|e| Error::Validation(format!("Failed to parse public key: {}", e)))?;
    Ok(key)
}

/// Verify `signature_path` as a detached signature over `document_path`,
/// made by the Cygwin release key.
pub fn verify_detached<P: AsRef<Path>, Q: AsRef<Path>>(
    document_path: P,
    signature_path: Q,
) -> Result<()> {
    verify_detached_with_key(CYGWIN_PUBRING, document_path, signature_path)
}

/// Like [`verify_detached`], against an arbitrary armored key.
pub fn verify_detached_with_key<P: AsRef<Path>, Q: AsRef<Path>>(
    armored_key: &str,
    document_path: P,
    signature_path: Q,
) -> Result<()> {
    let key = load_public_key(armored_key)?;
    let document = fs::read(document_path.as_ref())?;
    let signature_bytes = fs::read(signature_path.as_ref())?;

    let signature = parse_signature(&signature_bytes)?;
    verify_signature(&key, &signature, &document)?;

    log::debug!(
        "signature {} verified for {}",
        signature_path.as_ref().display(),
        document_path.as_ref().display()
    );
    Ok(())
}

fn parse_signature(bytes: &[u8]) -> Result<StandaloneSignature> {
    let parsed = if bytes.starts_with(b"-----BEGIN PGP SIGNATURE-----") {
        let armored = std::str::from_utf8(bytes)
            .map_err(|_| Error::Validation("Armored signature is not UTF-8".to_string()))?;
        StandaloneSignature::from_string(armored).map(|(sig, _headers)| sig)
    } else {
        StandaloneSignature::from_bytes(bytes)
    };

    parsed.map_err(|e| Error::Validation(format!("Failed to parse signature: {}", e)))
}

/// Accept a signature made by the primary key or any of its subkeys.
fn verify_signature(
    key: &SignedPublicKey,
    signature: &StandaloneSignature,
    document: &[u8],
) -> Result<()> {
    let primary_error = match signature.verify(key, document) {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };

    if key
        .public_subkeys
        .iter()
        .any(|subkey| signature.verify(subkey, document).is_ok())
    {
        return Ok(());
    }

    Err(Error::Validation(format!(
        "Signature verification failed: {}",
        primary_error
    )))
}
