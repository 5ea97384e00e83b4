#![allow(dead_code)]

#[derive(bizform::form::FormValues)]
struct LineItem<T> {
    amount: T,
}

fn main() {}
