use anyhow::Result;
use std::{fs, sync::Arc};

use hrsim::{
    api::{NoOpSink, StoreBuilder},
    protocol::regmap::{
        compile, encode, join_u32, normalize, split_u32, AddressError, CompileError,
        CompileOptions, EndianConfig, MapRow, OrderCode, ReadError, RowErrorKind, RowOptions,
    },
};
use strum::IntoEnumIterator;

fn quiet() -> StoreBuilder {
    StoreBuilder::new().with_sink(Arc::new(NoOpSink))
}

#[test]
fn four_x_references_map_from_base() {
    for t in [0u16, 1, 9, 1234, 9998] {
        let token = format!("4{:04}", u32::from(t) + 1);
        assert_eq!(normalize(&token, 40001), Ok(t), "token {token}");
    }
    assert!(matches!(
        normalize("40000", 40001),
        Err(AddressError::BelowBase { value: 40000, .. })
    ));
}

#[test]
fn uint16_values_read_back_unchanged() -> Result<()> {
    let values = [0u32, 1, 255, 256, 0x7FFF, 0x8000, 0xFFFE, 0xFFFF];
    let mut csv = String::from("address,type,value\n");
    for (i, v) in values.iter().enumerate() {
        csv.push_str(&format!("{i},uint16,{v}\n"));
    }
    let store = quiet().build_from_csv(&csv)?;
    let read = store.read(0, values.len() as u16)?;
    assert_eq!(
        read.into_iter().map(u32::from).collect::<Vec<_>>(),
        values.to_vec()
    );
    Ok(())
}

#[test]
fn thirty_two_bit_orders_reassemble() {
    for value in [0u32, 1, 0x1122_3344, 0xDEAD_BEEF, u32::MAX] {
        for code in OrderCode::iter() {
            assert_eq!(join_u32(split_u32(value, code), code), value);
        }
        let abcd = split_u32(value, OrderCode::Abcd);
        let dcba = split_u32(value, OrderCode::Dcba);
        assert_eq!(dcba, [abcd[1].swap_bytes(), abcd[0].swap_bytes()]);

        let badc = split_u32(value, OrderCode::Badc);
        let cdab = split_u32(value, OrderCode::Cdab);
        assert_eq!(badc, [abcd[0].swap_bytes(), abcd[1].swap_bytes()]);
        assert_eq!(cdab, [abcd[1], abcd[0]]);
    }
}

#[test]
fn ascii_padding_examples() {
    let defaults = EndianConfig::default();
    let plain = RowOptions::default();
    assert_eq!(encode("ascii", "AB", &plain, defaults), Ok(vec![0x4142]));
    assert_eq!(encode("ascii", "A", &plain, defaults), Ok(vec![0x4100]));

    let row = MapRow::new("0", "ascii", "A").with_pad("null");
    let null_pad = RowOptions::from_row(&row).unwrap();
    assert_eq!(encode("ascii", "A", &null_pad, defaults), Ok(vec![0x4100]));

    let null4 = RowOptions::from_row(&MapRow::new("0", "ascii", "ABC").with_length("4").with_pad("null")).unwrap();
    let space4 = RowOptions::from_row(&MapRow::new("0", "ascii", "ABC").with_length("4").with_pad("space")).unwrap();
    assert_eq!(encode("ascii", "ABC", &null4, defaults), Ok(vec![0x4142, 0x4300]));
    assert_eq!(encode("ascii", "ABC", &space4, defaults), Ok(vec![0x4142, 0x4320]));
}

#[test]
fn overlapping_spans_fail_in_any_order() {
    let a = MapRow::new("40001", "int32", "5");
    let b = MapRow::new("40002", "ascii", "XY");
    for rows in [vec![a.clone().at_line(2), b.clone().at_line(3)], vec![b.at_line(2), a.at_line(3)]] {
        let result = compile(&rows, CompileOptions::default());
        assert!(!result.is_success());
        assert!(result
            .errors()
            .iter()
            .any(|e| matches!(e.kind, RowErrorKind::Overlap { address: 1, .. })));
    }
}

#[test]
fn gaps_read_as_zero_or_fail_when_strict() -> Result<()> {
    let csv = "address,type,value\n40001,uint16,1\n40003,uint16,3\n";
    let lenient = quiet().build_from_csv(csv)?;
    assert_eq!(lenient.read(0, 4)?, vec![1, 0, 3, 0]);

    let strict = quiet().with_strict_gaps(true).build_from_csv(csv)?;
    assert_eq!(strict.read(0, 4), Err(ReadError::IllegalAddress { address: 1 }));
    assert_eq!(strict.read(2, 1)?, vec![3]);
    for (address, count) in [(0u16, 1u16), (0, 2), (2, 1), (2, 2), (1000, 3)] {
        assert_eq!(
            strict.validate(address, count),
            strict.read(address, count).is_ok()
        );
    }
    Ok(())
}

#[test]
fn writes_never_change_reads() -> Result<()> {
    let store = quiet().build_from_csv("address,type,value\n0,uint32,0x01020304\n")?;
    let before = store.read(0, 3)?;
    let ack = store.write(0, &[9, 9, 9]);
    assert_eq!(ack.count, 3);
    assert_eq!(store.read(0, 3)?, before);
    Ok(())
}

#[test]
fn missing_value_column_fails_before_rows() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("map.csv");
    // the row itself is broken too; only the column error may surface
    fs::write(&path, "address,type\nnot-an-address,float\n")?;

    let result = quiet().compiler().compile_path(&path);
    match result {
        Err(CompileError::MissingColumn { columns }) => assert_eq!(columns, vec!["value"]),
        other => panic!("expected missing column, got {other:?}"),
    }
    Ok(())
}

#[test]
fn latin1_map_files_are_accepted() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("map.csv");
    fs::write(
        &path,
        b"address,type,value,comment\n40001,uint16,7,caf\xe9\n".as_slice(),
    )?;
    let store = quiet().build_from_path(&path)?;
    assert_eq!(store.read(0, 1)?, vec![7]);
    Ok(())
}
