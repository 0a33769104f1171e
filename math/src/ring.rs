pub mod sampling;

use itertools::izip;

use crate::dft::ntt::Table;
use crate::error::MathError;
use crate::modulus::Modulus;
use crate::poly::{Coeff, Eval, Poly};

/// The ring `Z_q[X]/(X^n + 1)` together with its transform tables.
#[derive(Clone, Debug)]
pub struct Ring {
    pub modulus: Modulus,
    table: Table,
}

impl Ring {
    pub fn new(log_n: usize, modulus: Modulus, psi: u64) -> Result<Self, MathError> {
        Ok(Self {
            modulus,
            table: Table::new(modulus, psi, log_n)?,
        })
    }

    pub fn n(&self) -> usize {
        self.table.n()
    }

    pub fn log_n(&self) -> usize {
        self.table.log_n()
    }

    pub fn q(&self) -> u64 {
        self.modulus.q()
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn new_poly<R>(&self) -> Poly<R> {
        Poly::new(self.n())
    }

    #[inline(always)]
    fn assert_degree<R>(&self, a: &Poly<R>) {
        assert!(
            a.n() == self.n(),
            "invalid argument: a.n()={} != ring n={}",
            a.n(),
            self.n()
        );
    }

    /// Forward NTT; the output is fully reduced.
    pub fn to_eval(&self, a: Poly<Coeff>) -> Poly<Eval> {
        self.assert_degree(&a);
        let mut data: Vec<u64> = a.into_vec();
        self.table.forward_inplace::<false>(&mut data);
        Poly::from_vec(data)
    }

    /// Inverse NTT; the output is fully reduced.
    pub fn to_coeff(&self, a: Poly<Eval>) -> Poly<Coeff> {
        self.assert_degree(&a);
        let mut data: Vec<u64> = a.into_vec();
        self.table.backward_inplace::<false>(&mut data);
        Poly::from_vec(data)
    }

    /// Maps arbitrary words into `[0, q)`.
    pub fn reduce_inplace<R>(&self, a: &mut Poly<R>) {
        let m: &Modulus = &self.modulus;
        a.0.iter_mut().for_each(|x| *x = m.reduce(*x));
    }

    pub fn add_inplace<R>(&self, a: &mut Poly<R>, b: &Poly<R>) {
        self.assert_degree(b);
        let m: &Modulus = &self.modulus;
        izip!(a.0.iter_mut(), b.0.iter()).for_each(|(a, b)| *a = m.add(*a, *b));
    }

    pub fn add<R>(&self, a: &Poly<R>, b: &Poly<R>) -> Poly<R> {
        let mut c: Poly<R> = a.clone();
        self.add_inplace(&mut c, b);
        c
    }

    /// a <- a - b.
    pub fn sub_inplace<R>(&self, a: &mut Poly<R>, b: &Poly<R>) {
        self.assert_degree(b);
        let m: &Modulus = &self.modulus;
        izip!(a.0.iter_mut(), b.0.iter()).for_each(|(a, b)| *a = m.sub(*a, *b));
    }

    pub fn sub<R>(&self, a: &Poly<R>, b: &Poly<R>) -> Poly<R> {
        let mut c: Poly<R> = a.clone();
        self.sub_inplace(&mut c, b);
        c
    }

    pub fn neg_inplace<R>(&self, a: &mut Poly<R>) {
        let m: &Modulus = &self.modulus;
        a.0.iter_mut().for_each(|x| *x = m.neg(*x));
    }

    pub fn neg<R>(&self, a: &Poly<R>) -> Poly<R> {
        let mut c: Poly<R> = a.clone();
        self.neg_inplace(&mut c);
        c
    }

    /// Pointwise product, a <- a * b.
    pub fn mul_inplace(&self, a: &mut Poly<Eval>, b: &Poly<Eval>) {
        self.assert_degree(b);
        let m: &Modulus = &self.modulus;
        izip!(a.0.iter_mut(), b.0.iter()).for_each(|(a, b)| *a = m.mul(*a, *b));
    }

    pub fn mul(&self, a: &Poly<Eval>, b: &Poly<Eval>) -> Poly<Eval> {
        let mut c: Poly<Eval> = a.clone();
        self.mul_inplace(&mut c, b);
        c
    }

    /// c <- c + a * b, pointwise.
    pub fn mul_add_inplace(&self, a: &Poly<Eval>, b: &Poly<Eval>, c: &mut Poly<Eval>) {
        self.assert_degree(a);
        self.assert_degree(b);
        let m: &Modulus = &self.modulus;
        izip!(c.0.iter_mut(), a.0.iter(), b.0.iter())
            .for_each(|(c, a, b)| *c = m.add(*c, m.mul(*a, *b)));
    }

    pub fn mul_scalar_inplace<R>(&self, a: &mut Poly<R>, scalar: u64) {
        let m: &Modulus = &self.modulus;
        let s: u64 = m.reduce(scalar);
        a.0.iter_mut().for_each(|x| *x = m.mul(*x, s));
    }

    /// Sum of pointwise products accumulated in 128 bits and reduced once.
    /// Each term is below `q^2 < 2^120`, so up to 256 terms fit.
    pub fn dot_product<'a, I>(&self, pairs: I) -> Poly<Eval>
    where
        I: IntoIterator<Item = (&'a Poly<Eval>, &'a Poly<Eval>)>,
    {
        let mut acc: Vec<u128> = vec![0u128; self.n()];
        pairs.into_iter().for_each(|(a, b)| {
            self.assert_degree(a);
            self.assert_degree(b);
            izip!(acc.iter_mut(), a.0.iter(), b.0.iter())
                .for_each(|(acc, &a, &b)| *acc += a as u128 * b as u128);
        });
        Poly::from_vec(
            acc.into_iter()
                .map(|x| self.modulus.reduce_u128(x))
                .collect(),
        )
    }
}
