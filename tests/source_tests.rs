use embedded_io::{ErrorKind, Read, Seek, SeekFrom};
use statue_loader::SliceSource;

#[test]
fn test_slice_source_seek_and_read() {
    let data = [1u8, 2, 3, 4, 5, 6];
    let mut source = SliceSource::new(&data);

    assert_eq!(source.seek(SeekFrom::End(-2)), Ok(4));
    let mut buf = [0u8; 4];
    assert_eq!(source.read(&mut buf), Ok(2));
    assert_eq!(&buf[..2], &[5, 6]);
    assert_eq!(source.read(&mut buf), Ok(0));

    assert_eq!(source.seek(SeekFrom::Current(-5)), Ok(1));
    source.read_exact(&mut buf[..3]).expect("three bytes available");
    assert_eq!(&buf[..3], &[2, 3, 4]);
}

#[test]
fn test_slice_source_seek_bounds() {
    let data = [0u8; 8];
    let mut source = SliceSource::new(&data);

    assert_eq!(source.seek(SeekFrom::Current(-1)), Err(ErrorKind::InvalidInput));
    assert_eq!(source.position(), 0);

    // past the end is fine, reads just come back empty
    assert_eq!(source.seek(SeekFrom::Start(100)), Ok(100));
    let mut buf = [0u8; 1];
    assert_eq!(source.read(&mut buf), Ok(0));
    assert!(source.read_exact(&mut buf).is_err());
}
