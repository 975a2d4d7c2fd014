use crate::*;
use std::f64::consts::PI;

fn both_orders() -> [ByteOrder; 2] {
    [ByteOrder::Big, ByteOrder::Little]
}

// ============================================================================
//  SCALAR TESTS (Happy Path)
// ============================================================================

#[test]
fn test_scalar_roundtrip_both_orders() -> Result<()> {
    for order in both_orders() {
        let mut buf = Buffer::allocate(64);
        buf.set_order(order);
        buf.put_bool(true)?
            .put_u8(255)?
            .put_i8(-128)?
            .put_i16(i16::MIN)?
            .put_u16(u16::MAX)?
            .put_i32(-7)?
            .put_u32(0xDEAD_BEEF)?
            .put_i64(i64::MAX)?
            .put_u64(1)?
            .put_f32(3.5)?
            .put_f64(PI)?;
        buf.flip();

        assert_eq!(buf.get_bool()?, true);
        assert_eq!(buf.get_u8()?, 255);
        assert_eq!(buf.get_i8()?, -128);
        assert_eq!(buf.get_i16()?, i16::MIN);
        assert_eq!(buf.get_u16()?, u16::MAX);
        assert_eq!(buf.get_i32()?, -7);
        assert_eq!(buf.get_u32()?, 0xDEAD_BEEF);
        assert_eq!(buf.get_i64()?, i64::MAX);
        assert_eq!(buf.get_u64()?, 1);
        assert_eq!(buf.get_f32()?, 3.5);
        assert_eq!(buf.get_f64()?, PI);
        assert!(!buf.has_remaining());
    }
    Ok(())
}

#[test]
fn test_sequence_roundtrip_both_orders() -> Result<()> {
    for order in both_orders() {
        let mut buf = Buffer::allocate(256);
        buf.set_order(order);
        buf.put_bool_seq(&[true, false, true])?
            .put_bytes(&[1, 2, 3])?
            .put_i8_seq(&[-1, 0, 1])?
            .put_i16_seq(&[-300, 300])?
            .put_i32_seq(&[i32::MIN, 0, i32::MAX])?
            .put_i64_seq(&[-1, 1 << 40])?
            .put_f32_seq(&[0.25, -0.5])?
            .put_f64_seq(&[PI, -PI])?;
        buf.flip();

        assert_eq!(buf.get_bool_seq(3)?, vec![true, false, true]);
        assert_eq!(buf.get_bytes(3)?, vec![1, 2, 3]);
        assert_eq!(buf.get_i8_seq(3)?, vec![-1, 0, 1]);
        assert_eq!(buf.get_i16_seq(2)?, vec![-300, 300]);
        assert_eq!(buf.get_i32_seq(3)?, vec![i32::MIN, 0, i32::MAX]);
        assert_eq!(buf.get_i64_seq(2)?, vec![-1, 1 << 40]);
        assert_eq!(buf.get_f32_seq(2)?, vec![0.25, -0.5]);
        assert_eq!(buf.get_f64_seq(2)?, vec![PI, -PI]);
    }
    Ok(())
}

// ============================================================================
//  BYTE ORDER
// ============================================================================

#[test]
fn test_default_order_is_network() {
    let buf = Buffer::allocate(4);
    assert_eq!(buf.order(), ByteOrder::Big);
    assert_eq!(ByteOrder::default(), ByteOrder::NETWORK);
}

#[test]
fn test_byte_layout_follows_order() -> Result<()> {
    let mut big = Buffer::allocate(4);
    big.put_i32(0x0102_0304)?;
    assert_eq!(big.to_vec(), vec![1, 2, 3, 4]);

    let mut little = Buffer::allocate(4);
    little.set_order(ByteOrder::Little);
    little.put_i32(0x0102_0304)?;
    assert_eq!(little.to_vec(), vec![4, 3, 2, 1]);
    Ok(())
}

#[test]
fn test_swapped_and_native() {
    assert_eq!(ByteOrder::Big.swapped(), ByteOrder::Little);
    assert_eq!(ByteOrder::native().swapped().swapped(), ByteOrder::native());
}

#[test]
fn test_reading_with_wrong_order_swaps_bytes() -> Result<()> {
    let mut buf = Buffer::allocate(2);
    buf.put_u16(0x0102)?;
    buf.flip();
    buf.set_order(ByteOrder::Little);
    assert_eq!(buf.get_u16()?, 0x0201);
    Ok(())
}

// ============================================================================
//  BOUNDS
// ============================================================================

#[test]
fn test_position_past_limit_is_range_error() {
    let mut buf = Buffer::allocate(8);
    assert_eq!(
        buf.set_position(9).unwrap_err(),
        Error::Range { value: 9, bound: 8 }
    );
    assert!(buf.set_position(8).is_ok());
}

#[test]
fn test_limit_past_capacity_is_range_error() {
    let mut buf = Buffer::allocate(8);
    assert!(matches!(buf.set_limit(9), Err(Error::Range { .. })));
}

#[test]
fn test_shrinking_limit_pulls_position_back() -> Result<()> {
    let mut buf = Buffer::allocate(8);
    buf.set_position(6)?;
    buf.set_limit(4)?;
    assert_eq!(buf.position(), 4);
    assert_eq!(buf.remaining(), 0);
    Ok(())
}

#[test]
fn test_overflow_commits_nothing() -> Result<()> {
    let mut buf = Buffer::allocate(6);
    buf.put_u16(0xAAAA)?;
    let err = buf.put_i64(-1).unwrap_err();
    assert_eq!(err, Error::Overflow { needed: 8, remaining: 4 });
    assert_eq!(buf.position(), 2);
    assert_eq!(buf.raw_bytes(2, 4)?, vec![0, 0, 0, 0]);
    Ok(())
}

#[test]
fn test_sequence_overflow_commits_nothing() -> Result<()> {
    let mut buf = Buffer::allocate(10);
    let err = buf.put_i32_seq(&[1, 2, 3]).unwrap_err();
    assert_eq!(err, Error::Overflow { needed: 12, remaining: 10 });
    assert_eq!(buf.position(), 0);
    assert_eq!(buf.to_vec(), vec![0; 10]);
    Ok(())
}

#[test]
fn test_write_respects_limit_not_capacity() -> Result<()> {
    let mut buf = Buffer::allocate(8);
    buf.set_limit(2)?;
    assert!(matches!(buf.put_i32(1), Err(Error::Overflow { .. })));
    Ok(())
}

#[test]
fn test_underflow_commits_nothing() -> Result<()> {
    let mut buf = Buffer::wrap(vec![1, 2, 3]);
    let err = buf.get_i32().unwrap_err();
    assert_eq!(err, Error::Underflow { needed: 4, remaining: 3 });
    assert_eq!(buf.position(), 0);
    assert_eq!(buf.get_u8()?, 1);
    Ok(())
}

#[test]
fn test_huge_sequence_count_underflows() {
    let mut buf = Buffer::wrap(vec![0; 4]);
    assert!(matches!(buf.get_f64_seq(usize::MAX), Err(Error::Underflow { .. })));
}

// ============================================================================
//  CURSOR MANAGEMENT & SNAPSHOTS
// ============================================================================

#[test]
fn test_flip_clear_rewind() -> Result<()> {
    let mut buf = Buffer::allocate(8);
    buf.put_u16(7)?;
    buf.flip();
    assert_eq!((buf.position(), buf.limit()), (0, 2));

    buf.get_u16()?;
    buf.rewind();
    assert_eq!(buf.get_u16()?, 7);

    buf.clear();
    assert_eq!((buf.position(), buf.limit(), buf.capacity()), (0, 8, 8));
    Ok(())
}

#[test]
fn test_snapshots_do_not_move_cursor() -> Result<()> {
    let mut buf = Buffer::wrap(vec![9, 8, 7, 6]);
    buf.get_u8()?;
    assert_eq!(buf.to_vec(), vec![9, 8, 7, 6]);
    assert_eq!(buf.raw_bytes(1, 2)?, vec![8, 7]);
    assert_eq!(buf.position(), 1);
    assert!(matches!(buf.raw_bytes(3, 2), Err(Error::Range { .. })));
    Ok(())
}

#[test]
fn test_absolute_access() -> Result<()> {
    let mut buf = Buffer::allocate(8);
    buf.set_order(ByteOrder::Little);
    buf.put_i32(0)?.put_i32(5)?;
    buf.put_i32_at(0, 42)?;
    assert_eq!(buf.position(), 8);
    assert_eq!(buf.get_i32_at(0)?, 42);
    assert_eq!(buf.get_i32_at(4)?, 5);
    assert!(matches!(buf.get_i32_at(6), Err(Error::Range { .. })));
    Ok(())
}

#[test]
fn test_expand_preserves_contents() -> Result<()> {
    let mut buf = Buffer::allocate(2);
    buf.put_u16(0x0102)?;
    buf.expand(8);
    assert!(buf.capacity() >= 10);
    assert_eq!(buf.position(), 2);
    buf.put_u64(3)?;
    buf.flip();
    assert_eq!(buf.get_u16()?, 0x0102);
    assert_eq!(buf.get_u64()?, 3);
    Ok(())
}

#[test]
fn test_into_vec_truncates_to_limit() -> Result<()> {
    let mut buf = Buffer::allocate(16);
    buf.put_u8(1)?.put_u8(2)?;
    buf.flip();
    assert_eq!(buf.into_vec(), vec![1, 2]);
    Ok(())
}
