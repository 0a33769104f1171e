use fv::{Ciphertext, Encryptor, Evaluator, Parameters, SecretKey};
use math::modulus::WordOps;
use math::poly::{Eval, Poly};
use sampling::source::Source;
use tracing::instrument;

use crate::error::LinalgError;
use crate::layout::{PackedOperator, check_len, check_slots};

/// Client half of a shared vector: encryptions of `c` and `c²`.
#[derive(Clone, Debug)]
pub struct ClientShare {
    pub c: Ciphertext,
    pub c_sq: Ciphertext,
}

/// Server half `s`, preprocessed, together with its output mask.
#[derive(Clone, Debug)]
pub struct SquareServer {
    len: usize,
    /// `encode(2s)`, multiplied into the client's `c`.
    twice_s: Poly<Eval>,
    /// `delta·encode(s²)`.
    s_sq: Poly<Eval>,
    /// `delta·encode(r)`.
    mask: Poly<Eval>,
}

impl SquareServer {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl PackedOperator for SquareServer {
    type Input = ClientShare;
    type Output = Ciphertext;

    fn rotations(&self) -> Vec<usize> {
        Vec::new()
    }

    fn evaluate(&self, eval: &Evaluator, input: &ClientShare) -> Result<Ciphertext, LinalgError> {
        Ok(square_online(eval, input, self))
    }
}

#[instrument(skip_all, fields(len = c.len()))]
pub fn preprocess_client_share(
    params: &Parameters,
    enc: &mut Encryptor,
    sk: &SecretKey,
    c: &[u64],
) -> Result<ClientShare, LinalgError> {
    check_slots("client share", c.len(), params.n())?;
    let p: u64 = params.p();
    let c_sq: Vec<u64> = c.iter().map(|&x| (x % p) * (x % p) % p).collect();
    Ok(ClientShare {
        c: enc.encrypt_sk(params, sk, &params.encode(c)),
        c_sq: enc.encrypt_sk(params, sk, &params.encode(&c_sq)),
    })
}

/// Preprocesses the server share `s` and draws the uniform mask `r` the
/// server keeps as its new share.
#[instrument(skip_all, fields(len = s.len()))]
pub fn preprocess_server_share(
    params: &Parameters,
    s: &[u64],
    source: &mut Source,
) -> Result<(SquareServer, Vec<u64>), LinalgError> {
    check_slots("server share", s.len(), params.n())?;
    let p: u64 = params.p();
    let mask: u64 = p.mask();
    let twice_s: Vec<u64> = s.iter().map(|&x| 2 * (x % p) % p).collect();
    let s_sq: Vec<u64> = s.iter().map(|&x| (x % p) * (x % p) % p).collect();
    let r: Vec<u64> = (0..s.len()).map(|_| source.next_u64n(p, mask)).collect();
    let server: SquareServer = SquareServer {
        len: s.len(),
        twice_s: params.null_encrypt(&params.encode(&twice_s)),
        s_sq: params.encode_scaled(&s_sq),
        mask: params.encode_scaled(&r),
    };
    Ok((server, r))
}

/// `c·2s + c² + s² + r`, an encryption of `(c + s)² + r`.
pub fn square_online(eval: &Evaluator, share: &ClientShare, server: &SquareServer) -> Ciphertext {
    let mut ct: Ciphertext = eval.mult_plain(&share.c, &server.twice_s);
    eval.add_inplace(&mut ct, &share.c_sq);
    eval.add_plain_inplace(&mut ct, &server.s_sq);
    eval.add_plain_inplace(&mut ct, &server.mask);
    ct
}

/// The client's new share, `(c + s)² + r mod p`.
pub fn postprocess_client_share(params: &Parameters, sk: &SecretKey, ct: &Ciphertext, len: usize) -> Vec<u64> {
    let mut out: Vec<u64> = params.decrypt_decode(sk, ct);
    out.truncate(len);
    out
}

/// `(c + s)² + r mod p`, elementwise.
pub fn square_pt(c: &[u64], s: &[u64], r: &[u64], p: u64) -> Result<Vec<u64>, LinalgError> {
    check_len("server share", c.len(), s.len())?;
    check_len("mask", c.len(), r.len())?;
    Ok(c.iter()
        .zip(s)
        .zip(r)
        .map(|((&c, &s), &r)| {
            let x: u64 = (c % p + s % p) % p;
            (x * x % p + r % p) % p
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fv::{KeyGenerator, ParametersLiteral};

    #[test]
    fn plaintext_reference() {
        assert_eq!(square_pt(&[1, 2], &[2, 5], &[0, 3], 7).unwrap(), vec![2, 3]);
        assert!(square_pt(&[1], &[1, 2], &[0], 7).is_err());
    }

    #[test]
    fn shares_recombine() {
        let params: Parameters = Parameters::new(&ParametersLiteral::default()).unwrap();
        let p: u64 = params.p();
        let sk: SecretKey = KeyGenerator::with_seed([9u8; 32]).gen_secret_key(&params);
        let mut enc: Encryptor = Encryptor::with_seed([10u8; 32]);
        let mut source: Source = Source::new([11u8; 32]);

        let c: Vec<u64> = (0..300u64).map(|i| (i * 104729) % p).collect();
        let s: Vec<u64> = (0..300u64).map(|i| (p - 1 - i * 31) % p).collect();
        let share: ClientShare = preprocess_client_share(&params, &mut enc, &sk, &c).unwrap();
        let (server, r) = preprocess_server_share(&params, &s, &mut source).unwrap();
        assert_eq!(server.len(), 300);
        assert!(server.rotations().is_empty());

        let eval: Evaluator = Evaluator::new(&params);
        let ct: Ciphertext = server.evaluate(&eval, &share).unwrap();
        assert!(params.noise_margin(&sk, &ct) > 0.0);
        assert_eq!(
            postprocess_client_share(&params, &sk, &ct, 300),
            square_pt(&c, &s, &r, p).unwrap()
        );
    }
}
