#![allow(dead_code)]

#[derive(bizform::form::FormValues)]
struct Amount(u32);

fn main() {}
