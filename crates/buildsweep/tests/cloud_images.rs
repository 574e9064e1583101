use buildsweep::cloud::aws::{self, DescribeImages};
use buildsweep::cloud::gcp::{self, GcpImage};
use buildsweep::cloud::CloudCredentials;
use buildsweep::retention::Cutoff;
use chrono::{TimeZone, Utc};

fn cutoff() -> Cutoff {
    Cutoff::at(Utc.with_ymd_and_hms(2024, 3, 6, 12, 0, 0).unwrap())
}

const DESCRIBE_IMAGES: &str = r#"{
  "Images": [
    {
      "ImageId": "ami-old",
      "Name": "composer-api-0a1b",
      "CreationDate": "2024-02-01T08:00:00.000Z",
      "BlockDeviceMappings": [
        { "DeviceName": "/dev/sda1", "Ebs": { "SnapshotId": "snap-1", "VolumeSize": 10 } },
        { "DeviceName": "/dev/sdb", "VirtualName": "ephemeral0" }
      ]
    },
    {
      "ImageId": "ami-at-cutoff",
      "Name": "composer-api-2c3d",
      "CreationDate": "2024-03-06T12:00:00.000Z",
      "BlockDeviceMappings": []
    },
    {
      "ImageId": "ami-new",
      "Name": "composer-api-4e5f",
      "CreationDate": "2024-03-19T00:00:00.000Z"
    },
    {
      "ImageId": "ami-garbled",
      "CreationDate": "last tuesday"
    }
  ]
}"#;

#[test]
fn aws_selects_images_at_or_before_the_cutoff() {
    let parsed: DescribeImages = serde_json::from_str(DESCRIBE_IMAGES).unwrap();
    assert_eq!(parsed.images.len(), 4);

    let expired = aws::expired_images(parsed.images, cutoff());
    let ids: Vec<&str> = expired.iter().map(|i| i.image_id.as_str()).collect();
    assert_eq!(ids, vec!["ami-old", "ami-at-cutoff"]);
    assert_eq!(expired[0].snapshot_ids(), vec!["snap-1".to_string()]);
}

#[test]
fn gcp_selects_images_at_or_before_the_cutoff() {
    let images: Vec<GcpImage> = serde_json::from_str(
        r#"[
          { "name": "composer-api-aaa", "creationTimestamp": "2024-01-10T04:05:06.123-08:00", "family": "rhel" },
          { "name": "composer-api-bbb", "creationTimestamp": "2024-03-10T00:00:00.000-07:00" },
          { "name": "composer-api-ccc", "creationTimestamp": "" },
          { "name": "composer-api-ddd", "creationTimestamp": "2024-03-06T04:00:00.000-08:00" }
        ]"#,
    )
    .unwrap();

    let expired = gcp::expired_images(images, cutoff());
    let names: Vec<&str> = expired.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["composer-api-aaa", "composer-api-ddd"]);
}

#[test]
fn credentials_never_show_up_in_debug_output() {
    let aws = CloudCredentials::AwsStatic {
        access_key_id: "AKIA-visible".to_string(),
        secret_access_key: "wJalrXUtnFEMI".to_string(),
    };
    let rendered = format!("{aws:?}");
    assert!(rendered.contains("AKIA-visible"));
    assert!(!rendered.contains("wJalrXUtnFEMI"));

    let gcp = CloudCredentials::GcpServiceAccount(r#"{"private_key":"pk-material"}"#.to_string());
    assert!(!format!("{gcp:?}").contains("pk-material"));
}
