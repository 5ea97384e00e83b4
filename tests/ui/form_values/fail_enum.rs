#![allow(dead_code)]

#[derive(bizform::form::FormValues)]
enum InvoiceStatus {
    Draft,
    Sent,
}

fn main() {}
